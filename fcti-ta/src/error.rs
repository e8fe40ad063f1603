//! Error types for fcti-ta
//!
//! `TitleError` follows the failure taxonomy of the analysis pipeline:
//! transient failures are retried, structural failures abort destructive
//! steps, unresolvable properties end in a terminal non-retried outcome.
//! Data-quality problems are not errors; they are recorded as
//! `DataQualityWarning`s.

use crate::registry::RegistryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Title-analysis error
#[derive(Debug, Error)]
pub enum TitleError {
    /// Network, timeout or rate limit; retried with backoff
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Store failure before or during a destructive step; the step aborts
    #[error("Structural failure: {0}")]
    Structural(String),

    /// Nothing resolvable to work with (no identifier, no searchable seed)
    #[error("Unresolvable property: {0}")]
    Unresolvable(String),

    /// Analysis cancelled; partial state is kept for a resumed run
    #[error("Analysis cancelled")]
    Cancelled,

    /// Registry collaborator error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// fcti-common error (store, config, serialization)
    #[error("Common error: {0}")]
    Common(#[from] fcti_common::Error),
}

impl TitleError {
    /// Wrap a store error raised inside a destructive step
    pub fn structural(context: &str, err: impl std::fmt::Display) -> Self {
        TitleError::Structural(format!("{}: {}", context, err))
    }

    pub fn is_transient(&self) -> bool {
        match self {
            TitleError::Transient(_) => true,
            TitleError::Registry(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Result type for title-analysis operations
pub type TitleResult<T> = Result<T, TitleError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// fcti-common error
    #[error("Common error: {0}")]
    Common(#[from] fcti_common::Error),

    /// Title-analysis error
    #[error("Title analysis error: {0}")]
    Title(#[from] TitleError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(fcti_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(fcti_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
            ApiError::Title(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TITLE_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
