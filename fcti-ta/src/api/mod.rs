//! HTTP read API for fcti-ta
//!
//! Downstream consumers read ownership periods and classified
//! encumbrances per property; analysis itself is driven by the service,
//! not over HTTP.

pub mod health;
pub mod title;

pub use health::health_routes;
pub use title::title_routes;
