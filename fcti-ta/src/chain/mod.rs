//! Chain-of-title construction

pub mod association;
pub mod builder;
pub mod rebuild;

pub use association::{associate, instrument_events, Association};
pub use builder::{build_chain, is_cross_lot, ChainBuild};
pub use rebuild::{reapply_snapshots, rebuild_chain, RebuildOutcome};
