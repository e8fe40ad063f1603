//! Legal description parsing and search permutations

pub mod parser;
pub mod permutations;

pub use parser::{parse, same_subdivision, ParsedLegal};
pub use permutations::{generate_permutations, LegalPermutation};
