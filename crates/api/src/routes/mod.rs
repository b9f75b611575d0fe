pub mod health;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /webhooks/subscriptions                       list, create
/// /webhooks/subscriptions/{id}                  get, update, delete
/// /webhooks/subscriptions/{id}/rotate-secret    rotate signing secret (POST)
/// /webhooks/subscriptions/{id}/test             synchronous test delivery (POST)
/// /webhooks/subscriptions/{id}/deliveries       deliveries for one subscription
/// /webhooks/deliveries                          deliveries for the tenant
/// /webhooks/deliveries/{id}                     delivery + attempt history
/// /webhooks/deliveries/{id}/retry               manual retry (POST)
/// /webhooks/events                              event type catalog
/// /webhooks/events/{event_type}                 one catalog entry
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/webhooks", webhooks::router())
}
