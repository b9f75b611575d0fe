//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Body of `POST /deliveries/{id}/retry`.
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    /// `false` when the delivery already succeeded, is in flight, or its
    /// subscription is inactive.
    pub retried: bool,
}
