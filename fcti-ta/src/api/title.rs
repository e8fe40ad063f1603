//! Per-property title read model
//!
//! GET /properties/:id/title

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult, TitleError},
    service::TitleReport,
    AppState,
};

/// GET /properties/:id/title
///
/// Ordered ownership periods, gaps, classified encumbrances, equity
/// estimate, warnings and status flags for one property.
///
/// # Errors
/// 404 when the property has never been analysed.
pub async fn get_title(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> ApiResult<Json<TitleReport>> {
    let property_id = property_id.trim();
    if property_id.is_empty() {
        return Err(ApiError::BadRequest("property id is empty".to_string()));
    }

    match state.service.title_report(property_id).await {
        Ok(report) => Ok(Json(report)),
        Err(TitleError::Common(fcti_common::Error::NotFound(msg))) => Err(ApiError::NotFound(msg)),
        Err(e) => Err(e.into()),
    }
}

/// Build title routes
pub fn title_routes() -> Router<AppState> {
    Router::new().route("/properties/:id/title", get(get_title))
}
