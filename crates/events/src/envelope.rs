//! The signed JSON body sent to subscribers.

use chrono::{SecondsFormat, Utc};
use hookline_core::types::TenantId;
use serde::{Deserialize, Serialize};

/// `{"id", "type", "timestamp", "data", "tenant_id"}`, serialized once and
/// signed over those exact bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Idempotency key shared by every attempt of a delivery.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// ISO-8601 UTC with millisecond precision. Also sent as `X-Webhook-Timestamp`.
    pub timestamp: String,
    pub data: serde_json::Value,
    pub tenant_id: TenantId,
}

impl EventEnvelope {
    /// Build an envelope stamped with the current time.
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        data: serde_json::Value,
        tenant_id: TenantId,
    ) -> Self {
        Self {
            id: event_id.into(),
            event_type: event_type.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
            tenant_id,
        }
    }

    /// The exact bytes to sign and send.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
