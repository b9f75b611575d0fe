//! Query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped via `clamp_limit` / `clamp_offset` before reaching
/// the store.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /subscriptions?active=&limit=&offset=`
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionListParams {
    /// Filter on `is_active`; absent lists both.
    pub active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /deliveries?status=&event_type=&event_id=&limit=&offset=`
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryListParams {
    /// One of `PENDING`, `SUCCESS`, `FAILED`, `RETRYING`, `DISABLED`
    /// (case-insensitive).
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub event_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
