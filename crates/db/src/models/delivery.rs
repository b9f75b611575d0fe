//! Delivery models: the latest-status row per logical delivery and the
//! append-only attempt history behind it.

use hookline_core::delivery::DeliveryStatus;
use hookline_core::types::{DbId, TenantId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// A row from `webhook_deliveries`: one logical delivery of one event to one
/// subscription, reflecting its most recent attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookDelivery {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub subscription_id: DbId,
    pub event_type: String,
    /// Idempotency key shared by every attempt of this delivery.
    pub event_id: String,
    pub event_data: serde_json::Value,
    #[sqlx(try_from = "String")]
    pub status: DeliveryStatus,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub attempt_number: i32,
    pub next_retry_at: Option<Timestamp>,
    pub duration_ms: Option<i64>,
    /// Set while an attempt is in flight (status `PENDING`).
    #[serde(skip_serializing)]
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// DeliveryAttempt
// ---------------------------------------------------------------------------

/// A row from `webhook_delivery_attempts` (append-only).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeliveryAttempt {
    pub id: DbId,
    pub delivery_id: DbId,
    pub tenant_id: TenantId,
    pub attempt_number: i32,
    #[sqlx(try_from = "String")]
    pub status: DeliveryStatus,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub attempted_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A delivery opened right before its first attempt (status `PENDING`).
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub subscription_id: DbId,
    pub event_type: String,
    pub event_id: String,
    pub event_data: serde_json::Value,
    pub claimed_at: Timestamp,
}

/// The resolved result of one attempt, written to both tables.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt_number: i32,
    pub status: DeliveryStatus,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub next_retry_at: Option<Timestamp>,
    pub attempted_at: Timestamp,
    /// The claim this attempt ran under. The write is dropped if the
    /// delivery has since been released and claimed again.
    pub claimed_at: Option<Timestamp>,
}

/// Filters for delivery listings. Always applied within one tenant.
#[derive(Debug, Clone)]
pub struct DeliveryFilter {
    pub subscription_id: Option<DbId>,
    pub status: Option<DeliveryStatus>,
    pub event_type: Option<String>,
    pub event_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for DeliveryFilter {
    fn default() -> Self {
        Self {
            subscription_id: None,
            status: None,
            event_type: None,
            event_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A delivery together with its full attempt history (oldest first).
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryDetail {
    #[serde(flatten)]
    pub delivery: WebhookDelivery,
    pub attempts: Vec<DeliveryAttempt>,
}
