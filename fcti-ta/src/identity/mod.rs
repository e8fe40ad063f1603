//! Party-name normalization and identity linking

pub mod linker;
pub mod normalizer;

pub use linker::{
    best_link, link_candidate, parties_match, party_similarity, token_similarity, IdentityLinker,
    LinkOutcome,
};
pub use normalizer::{entity_type, is_institutional, normalize};
