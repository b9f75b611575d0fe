//! Handlers for webhook subscription management.
//!
//! Every endpoint is scoped to the caller's tenant via [`AuthUser`].
//! Subscriptions belonging to another tenant are reported as not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hookline_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use hookline_core::types::DbId;
use hookline_db::models::delivery::DeliveryFilter;
use hookline_db::models::subscription::{CreateWebhookSubscription, UpdateWebhookSubscription};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::{PaginationParams, SubscriptionListParams};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Subscription CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/webhooks/subscriptions
pub async fn list_subscriptions(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SubscriptionListParams>,
) -> AppResult<impl IntoResponse> {
    let subscriptions = state
        .webhooks
        .subscriptions
        .list(user.tenant_id, params.active, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse {
        data: subscriptions,
    }))
}

/// POST /api/v1/webhooks/subscriptions
///
/// Register an endpoint. The response carries the signing secret; it is
/// not returned by any later read.
pub async fn create_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWebhookSubscription>,
) -> AppResult<impl IntoResponse> {
    let created = state
        .webhooks
        .subscriptions
        .create(user.tenant_id, input)
        .await?;

    tracing::info!(
        subscription_id = %created.subscription.id,
        user_id = %user.user_id,
        "Subscription created via API",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /api/v1/webhooks/subscriptions/{id}
pub async fn get_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let subscription = state.webhooks.subscriptions.get(user.tenant_id, id).await?;
    Ok(Json(DataResponse { data: subscription }))
}

/// PUT /api/v1/webhooks/subscriptions/{id}
///
/// Absent fields are left unchanged. Setting `is_active: true` re-enables a
/// disabled subscription and clears its disablement reason.
pub async fn update_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateWebhookSubscription>,
) -> AppResult<impl IntoResponse> {
    let updated = state
        .webhooks
        .subscriptions
        .update(user.tenant_id, id, input)
        .await?;
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/webhooks/subscriptions/{id}
///
/// Hard delete; the subscription's deliveries are removed with it.
pub async fn delete_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.webhooks.subscriptions.delete(user.tenant_id, id).await?;

    tracing::info!(subscription_id = %id, user_id = %user.user_id, "Subscription deleted via API");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Secret and connectivity
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/subscriptions/{id}/rotate-secret
pub async fn rotate_secret(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let rotated = state
        .webhooks
        .subscriptions
        .rotate_secret(user.tenant_id, id)
        .await?;

    tracing::info!(subscription_id = %id, user_id = %user.user_id, "Subscription secret rotated");

    Ok(Json(DataResponse { data: rotated }))
}

/// POST /api/v1/webhooks/subscriptions/{id}/test
///
/// Send a `webhook.test` event and wait for the endpoint's answer. The
/// delivery is recorded like any other.
pub async fn test_subscription(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.webhooks.engine.send_test(user.tenant_id, id).await?;

    tracing::info!(
        subscription_id = %id,
        delivery_id = %outcome.delivery_id,
        status = %outcome.status,
        user_id = %user.user_id,
        "Test delivery sent",
    );

    Ok(Json(DataResponse { data: outcome }))
}

/// GET /api/v1/webhooks/subscriptions/{id}/deliveries
pub async fn list_subscription_deliveries(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    // 404 for unknown or foreign subscriptions rather than an empty list.
    state.webhooks.subscriptions.get(user.tenant_id, id).await?;

    let filter = DeliveryFilter {
        subscription_id: Some(id),
        limit: clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT),
        offset: clamp_offset(params.offset),
        ..Default::default()
    };
    let deliveries = state
        .webhooks
        .store
        .list_deliveries(user.tenant_id, &filter)
        .await?;

    Ok(Json(DataResponse { data: deliveries }))
}
