//! Route definitions for webhook management, mounted at `/webhooks`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{deliveries, events, subscriptions};
use crate::state::AppState;

/// ```text
/// GET    /subscriptions                       -> list_subscriptions
/// POST   /subscriptions                       -> create_subscription
/// GET    /subscriptions/{id}                  -> get_subscription
/// PUT    /subscriptions/{id}                  -> update_subscription
/// DELETE /subscriptions/{id}                  -> delete_subscription
/// POST   /subscriptions/{id}/rotate-secret    -> rotate_secret
/// POST   /subscriptions/{id}/test             -> test_subscription
/// GET    /subscriptions/{id}/deliveries       -> list_subscription_deliveries
/// GET    /deliveries                          -> list_deliveries
/// GET    /deliveries/{id}                     -> get_delivery
/// POST   /deliveries/{id}/retry               -> retry_delivery
/// GET    /events                              -> list_event_types
/// GET    /events/{event_type}                 -> get_event_type
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route(
            "/subscriptions/{id}",
            get(subscriptions::get_subscription)
                .put(subscriptions::update_subscription)
                .delete(subscriptions::delete_subscription),
        )
        .route(
            "/subscriptions/{id}/rotate-secret",
            post(subscriptions::rotate_secret),
        )
        .route("/subscriptions/{id}/test", post(subscriptions::test_subscription))
        .route(
            "/subscriptions/{id}/deliveries",
            get(subscriptions::list_subscription_deliveries),
        )
        .route("/deliveries", get(deliveries::list_deliveries))
        .route("/deliveries/{id}", get(deliveries::get_delivery))
        .route("/deliveries/{id}/retry", post(deliveries::retry_delivery))
        .route("/events", get(events::list_event_types))
        .route("/events/{event_type}", get(events::get_event_type))
}
