//! Handlers exposing the event type catalog.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/webhooks/events
pub async fn list_event_types(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.webhooks.registry.list(),
    }))
}

/// GET /api/v1/webhooks/events/{event_type}
pub async fn get_event_type(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(event_type): Path<String>,
) -> AppResult<impl IntoResponse> {
    let schema = state
        .webhooks
        .registry
        .get(&event_type)
        .ok_or_else(|| AppError::NotFound(format!("event type '{event_type}' is not registered")))?;
    Ok(Json(DataResponse { data: schema }))
}
