//! Handlers for delivery history and manual retries.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use hookline_core::delivery::DeliveryStatus;
use hookline_core::error::CoreError;
use hookline_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use hookline_core::types::DbId;
use hookline_db::models::delivery::{DeliveryDetail, DeliveryFilter};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::DeliveryListParams;
use crate::response::{DataResponse, RetryResponse};
use crate::state::AppState;

/// GET /api/v1/webhooks/deliveries
///
/// Newest first, across all of the tenant's subscriptions.
pub async fn list_deliveries(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<DeliveryListParams>,
) -> AppResult<impl IntoResponse> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<DeliveryStatus>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filter = DeliveryFilter {
        subscription_id: None,
        status,
        event_type: params.event_type,
        event_id: params.event_id,
        limit: clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT),
        offset: clamp_offset(params.offset),
    };
    let deliveries = state
        .webhooks
        .store
        .list_deliveries(user.tenant_id, &filter)
        .await?;

    Ok(Json(DataResponse { data: deliveries }))
}

/// GET /api/v1/webhooks/deliveries/{id}
///
/// The delivery's latest state plus every attempt, oldest first.
pub async fn get_delivery(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let delivery = state
        .webhooks
        .store
        .find_delivery(user.tenant_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "webhook_delivery",
            id,
        }))?;
    let attempts = state.webhooks.store.list_attempts(user.tenant_id, id).await?;

    Ok(Json(DataResponse {
        data: DeliveryDetail { delivery, attempts },
    }))
}

/// POST /api/v1/webhooks/deliveries/{id}/retry
///
/// Attempt the delivery again now. Answers `{"retried": false}` instead of
/// an error when there is nothing to do.
pub async fn retry_delivery(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let retried = state
        .webhooks
        .engine
        .retry_delivery(id, user.tenant_id)
        .await?;

    tracing::info!(delivery_id = %id, user_id = %user.user_id, retried, "Manual retry requested");

    Ok(Json(DataResponse {
        data: RetryResponse { retried },
    }))
}
