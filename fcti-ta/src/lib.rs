//! fcti-ta library interface
//!
//! Title analysis for foreclosure properties: document discovery against a
//! public registry, chain-of-title construction, and lien survival
//! classification. Exposes the engine pieces and the read API for
//! integration testing.

pub mod api;
pub mod chain;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod frontier;
pub mod identity;
pub mod legal;
pub mod models;
pub mod registry;
pub mod service;
pub mod store;
pub mod survival;

pub use crate::error::{ApiError, ApiResult, TitleError, TitleResult};
pub use crate::service::{AnalysisReport, TitleAnalysisService, TitleReport};

use axum::Router;
use chrono::{DateTime, Utc};
use fcti_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: TitleAnalysisService,
    /// Progress events published by the engine
    pub events: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: TitleAnalysisService, events: EventBus) -> Self {
        Self {
            service,
            events,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::title_routes())
        .merge(api::health_routes())
        .with_state(state)
}
