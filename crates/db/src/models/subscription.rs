//! Webhook subscription models and DTOs.

use std::collections::BTreeMap;

use hookline_core::delivery::RetryPolicy;
use hookline_core::types::{DbId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Metadata keys
// ---------------------------------------------------------------------------

/// Keys written into `webhook_subscriptions.metadata` by the system.
pub mod metadata_keys {
    pub const DISABLED_REASON: &str = "disabled_reason";
    pub const DISABLED_AT: &str = "disabled_at";
    pub const SECRET_ROTATED_AT: &str = "secret_rotated_at";
    pub const SECRET_ROTATION_COUNT: &str = "secret_rotation_count";
    pub const PREVIOUS_SECRET_HINT: &str = "previous_secret_hint";
}

// ---------------------------------------------------------------------------
// WebhookSubscription
// ---------------------------------------------------------------------------

/// A row from the `webhook_subscriptions` table.
///
/// **Note:** `secret` holds the sealed signing secret and is never
/// serialized. The plaintext is only returned by create and rotate.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookSubscription {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub url: String,
    pub events: Vec<String>,
    #[serde(skip_serializing)]
    pub secret: String,
    pub headers: Json<BTreeMap<String, String>>,
    pub is_active: bool,
    pub retry_enabled: bool,
    pub max_retries: i32,
    pub timeout_secs: i32,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_triggered_at: Option<Timestamp>,
    pub last_success_at: Option<Timestamp>,
    pub last_failure_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WebhookSubscription {
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.events.iter().any(|e| e == event_type)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_enabled: self.retry_enabled,
            max_retries: self.max_retries,
        }
    }

    /// Reason recorded when the subscription was disabled, if any.
    pub fn disabled_reason(&self) -> Option<&str> {
        self.metadata
            .get(metadata_keys::DISABLED_REASON)
            .and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// DTO for registering a new webhook endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWebhookSubscription {
    pub url: String,
    /// Event type identifiers to receive. Must not be empty.
    pub events: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub retry_enabled: Option<bool>,
    pub max_retries: Option<i32>,
    /// Per-attempt timeout in seconds.
    pub timeout: Option<i32>,
}

/// DTO for updating an existing subscription. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWebhookSubscription {
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub is_active: Option<bool>,
    pub retry_enabled: Option<bool>,
    pub max_retries: Option<i32>,
    pub timeout: Option<i32>,
}

/// A validated subscription ready to insert. `secret` is already sealed.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub url: String,
    pub events: Vec<String>,
    pub secret: String,
    pub headers: BTreeMap<String, String>,
    pub retry_enabled: bool,
    pub max_retries: i32,
    pub timeout_secs: i32,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Returned once, when a subscription is created. Includes the plaintext secret.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionWithSecret {
    #[serde(flatten)]
    pub subscription: WebhookSubscription,
    /// The signing secret. Shown **once**; read APIs never return it.
    pub secret: String,
}

/// Returned by a secret rotation. The previous secret stops working at once.
#[derive(Debug, Clone, Serialize)]
pub struct RotatedSecret {
    pub subscription_id: DbId,
    pub secret: String,
    pub rotated_at: Timestamp,
}
