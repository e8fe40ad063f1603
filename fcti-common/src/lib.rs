//! # FCTI Common Library
//!
//! Shared code for the foreclosure title-intelligence crates:
//! - Error type shared by every crate
//! - TOML configuration loading and config-file resolution
//! - Progress events (`TitleEvent`) and the broadcast `EventBus`
//! - Recording-date parsing for heterogeneous registry payloads

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
