use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use hookline_core::delivery::{
    claim_stamp, classify, next_transition, truncate_body, DeliveryStatus, ResponseClass,
    GONE_DISABLE_REASON, GONE_ERROR_MESSAGE, RESPONSE_BODY_CAP,
};
use hookline_core::error::CoreError;
use hookline_core::event_types::WebhookEventType;
use hookline_core::signing::sign;
use hookline_core::types::{DbId, TenantId, Timestamp};
use hookline_db::models::delivery::{AttemptRecord, NewDelivery, WebhookDelivery};
use hookline_db::models::subscription::WebhookSubscription;
use serde::Serialize;

use super::request::build_headers;
use crate::envelope::EventEnvelope;
use crate::error::WebhookError;
use crate::store::WebhookStore;
use crate::subscriptions::SubscriptionService;

// ---------------------------------------------------------------------------
// DeliveryOutcome
// ---------------------------------------------------------------------------

/// How one attempt resolved.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub delivery_id: DbId,
    pub subscription_id: DbId,
    pub event_id: String,
    pub status: DeliveryStatus,
    pub attempt_number: i32,
    pub response_code: Option<u16>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub next_retry_at: Option<Timestamp>,
}

/// Raw result of the HTTP exchange, before the state machine runs.
struct Sent {
    response_code: Option<u16>,
    response_body: Option<String>,
    error: Option<String>,
    duration_ms: i64,
}

impl Sent {
    fn not_sent(error: String) -> Self {
        Self {
            response_code: None,
            response_body: None,
            error: Some(error),
            duration_ms: 0,
        }
    }
}

/// The delivery row an attempt reports to, and the claim it holds on it.
struct Claim<'a> {
    tenant_id: TenantId,
    delivery_id: DbId,
    claimed_at: Option<Timestamp>,
    event_id: &'a str,
    attempt_number: i32,
}

// ---------------------------------------------------------------------------
// DeliveryEngine
// ---------------------------------------------------------------------------

/// Sends signed event envelopes to subscriber endpoints.
///
/// Every attempt resolves to a [`DeliveryOutcome`]; transport failures,
/// signing failures and persistence failures are logged and recorded on the
/// delivery rather than returned, so one subscriber can never break a
/// fan-out to its siblings.
#[derive(Clone)]
pub struct DeliveryEngine {
    client: reqwest::Client,
    store: Arc<dyn WebhookStore>,
    subscriptions: SubscriptionService,
}

impl DeliveryEngine {
    /// Build an engine with its own HTTP client. Redirects are not followed.
    pub fn new(
        store: Arc<dyn WebhookStore>,
        subscriptions: SubscriptionService,
        user_agent: &str,
    ) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::HttpClient(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            store,
            subscriptions,
        })
    }

    /// First attempt of a new delivery.
    ///
    /// The delivery is opened as `PENDING` before the request goes out, so a
    /// crash mid-flight leaves a claim the retry sweep can recover.
    pub async fn attempt(
        &self,
        subscription: &WebhookSubscription,
        event_type: &str,
        event_data: &serde_json::Value,
        event_id: &str,
        tenant_id: TenantId,
    ) -> DeliveryOutcome {
        let delivery = NewDelivery {
            id: uuid::Uuid::now_v7(),
            tenant_id,
            subscription_id: subscription.id,
            event_type: event_type.to_string(),
            event_id: event_id.to_string(),
            event_data: event_data.clone(),
            claimed_at: claim_stamp(Utc::now()),
        };

        let opened = match self.store.open_delivery(&delivery).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    delivery_id = %delivery.id,
                    subscription_id = %subscription.id,
                    event_id,
                    error = %e,
                    "Failed to open delivery record, sending anyway"
                );
                false
            }
        };

        let sent = self
            .send(subscription, event_type, event_data, event_id, tenant_id)
            .await;

        if !opened {
            if let Err(e) = self.store.open_delivery(&delivery).await {
                tracing::error!(
                    delivery_id = %delivery.id,
                    subscription_id = %subscription.id,
                    event_id,
                    error = %e,
                    "Failed to open delivery record after sending"
                );
            }
        }

        let claim = Claim {
            tenant_id,
            delivery_id: delivery.id,
            claimed_at: Some(delivery.claimed_at),
            event_id,
            attempt_number: 1,
        };
        self.finish(subscription, claim, sent).await
    }

    /// Next attempt of a delivery that has already been claimed.
    pub async fn resume(
        &self,
        delivery: &WebhookDelivery,
        subscription: &WebhookSubscription,
    ) -> DeliveryOutcome {
        let attempt_number = delivery.attempt_number + 1;
        let sent = self
            .send(
                subscription,
                &delivery.event_type,
                &delivery.event_data,
                &delivery.event_id,
                delivery.tenant_id,
            )
            .await;

        let claim = Claim {
            tenant_id: delivery.tenant_id,
            delivery_id: delivery.id,
            claimed_at: delivery.claimed_at,
            event_id: &delivery.event_id,
            attempt_number,
        };
        self.finish(subscription, claim, sent).await
    }

    /// Manually retry a delivery.
    ///
    /// Returns `Ok(false)` without doing anything when the delivery already
    /// succeeded, is in flight, or its subscription is inactive.
    pub async fn retry_delivery(
        &self,
        delivery_id: DbId,
        tenant_id: TenantId,
    ) -> Result<bool, WebhookError> {
        let delivery = self
            .store
            .find_delivery(tenant_id, delivery_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "webhook_delivery",
                id: delivery_id,
            })?;

        if delivery.status == DeliveryStatus::Success {
            tracing::debug!(delivery_id = %delivery_id, "Delivery already succeeded, not retrying");
            return Ok(false);
        }

        let subscription = match self
            .store
            .find_subscription(tenant_id, delivery.subscription_id)
            .await?
        {
            Some(sub) if sub.is_active => sub,
            _ => {
                tracing::debug!(
                    delivery_id = %delivery_id,
                    subscription_id = %delivery.subscription_id,
                    "Subscription inactive, not retrying"
                );
                return Ok(false);
            }
        };

        let Some(claimed) = self
            .store
            .claim_for_retry(tenant_id, delivery_id, Utc::now())
            .await?
        else {
            return Ok(false);
        };

        tracing::info!(delivery_id = %delivery_id, tenant_id = %tenant_id, "Manual delivery retry");
        self.resume(&claimed, &subscription).await;
        Ok(true)
    }

    /// Send a synthetic `webhook.test` event to one subscription and wait
    /// for the result.
    pub async fn send_test(
        &self,
        tenant_id: TenantId,
        subscription_id: DbId,
    ) -> Result<DeliveryOutcome, WebhookError> {
        let subscription = self.subscriptions.get(tenant_id, subscription_id).await?;
        let event_type = WebhookEventType::WebhookTest;
        let mut data = event_type.example();
        if let Some(fields) = data.as_object_mut() {
            fields.insert(
                "subscription_id".to_string(),
                serde_json::Value::String(subscription.id.to_string()),
            );
        }
        let event_id = uuid::Uuid::new_v4().to_string();

        Ok(self
            .attempt(&subscription, event_type.as_str(), &data, &event_id, tenant_id)
            .await)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Build, sign and POST the envelope. Never fails; problems end up in
    /// [`Sent::error`].
    async fn send(
        &self,
        subscription: &WebhookSubscription,
        event_type: &str,
        event_data: &serde_json::Value,
        event_id: &str,
        tenant_id: TenantId,
    ) -> Sent {
        let envelope = EventEnvelope::new(event_id, event_type, event_data.clone(), tenant_id);
        let body = match envelope.to_bytes() {
            Ok(body) => body,
            Err(e) => return Sent::not_sent(format!("failed to serialize envelope: {e}")),
        };
        let secret = match self.subscriptions.signing_secret(subscription) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::error!(subscription_id = %subscription.id, error = %e, "Signing secret unavailable");
                return Sent::not_sent(format!("signing secret unavailable: {e}"));
            }
        };
        let signature = sign(&body, &secret);
        let headers = build_headers(&subscription.headers, &signature, &envelope);
        let timeout = Duration::from_secs(subscription.timeout_secs.max(1) as u64);

        let start = Instant::now();
        let result = self
            .client
            .post(&subscription.url)
            .headers(headers)
            .timeout(timeout)
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let code = response.status().as_u16();
                let text = read_capped(response, RESPONSE_BODY_CAP).await;
                Sent {
                    response_code: Some(code),
                    response_body: Some(text),
                    error: None,
                    duration_ms: start.elapsed().as_millis() as i64,
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("request timed out after {}s", timeout.as_secs())
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    format!("request error: {e}")
                };
                Sent {
                    response_code: None,
                    response_body: None,
                    error: Some(error),
                    duration_ms: start.elapsed().as_millis() as i64,
                }
            }
        }
    }

    /// Run the state machine on a finished exchange and persist the result
    /// under the claim the attempt was made with.
    async fn finish(
        &self,
        subscription: &WebhookSubscription,
        claim: Claim<'_>,
        sent: Sent,
    ) -> DeliveryOutcome {
        let Claim {
            tenant_id,
            delivery_id,
            claimed_at,
            event_id,
            attempt_number,
        } = claim;
        let now = Utc::now();
        let class = classify(sent.response_code);
        let transition = next_transition(class, subscription.retry_policy(), attempt_number, now);

        let error_message = match class {
            ResponseClass::Delivered => None,
            ResponseClass::Gone => Some(GONE_ERROR_MESSAGE.to_string()),
            ResponseClass::Failed => sent
                .error
                .or_else(|| sent.response_code.map(|code| format!("endpoint returned {code}"))),
        };

        if transition.disable_subscription {
            if let Err(e) = self
                .subscriptions
                .disable(tenant_id, subscription.id, GONE_DISABLE_REASON)
                .await
            {
                tracing::error!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to disable subscription after 410"
                );
            }
        }

        self.subscriptions
            .record_outcome(tenant_id, subscription.id, transition.succeeded())
            .await;

        let record = AttemptRecord {
            attempt_number,
            status: transition.status,
            response_code: sent.response_code.map(i32::from),
            response_body: sent.response_body,
            error_message: error_message.clone(),
            duration_ms: sent.duration_ms,
            next_retry_at: transition.next_retry_at,
            attempted_at: now,
            claimed_at,
        };
        match self.store.record_attempt(tenant_id, delivery_id, &record).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                delivery_id = %delivery_id,
                subscription_id = %subscription.id,
                attempt_number,
                "Delivery was claimed again before this attempt finished, outcome not recorded"
            ),
            Err(e) => tracing::error!(
                delivery_id = %delivery_id,
                subscription_id = %subscription.id,
                attempt_number,
                error = %e,
                "Failed to persist delivery attempt"
            ),
        }

        match transition.status {
            DeliveryStatus::Success => tracing::info!(
                delivery_id = %delivery_id,
                subscription_id = %subscription.id,
                event_id,
                attempt_number,
                duration_ms = sent.duration_ms,
                "Webhook delivered"
            ),
            status => tracing::warn!(
                delivery_id = %delivery_id,
                subscription_id = %subscription.id,
                event_id,
                attempt_number,
                status = %status,
                response_code = ?sent.response_code,
                error = ?error_message,
                "Webhook delivery attempt failed"
            ),
        }

        DeliveryOutcome {
            delivery_id,
            subscription_id: subscription.id,
            event_id: event_id.to_string(),
            status: transition.status,
            attempt_number,
            response_code: sent.response_code,
            error_message,
            duration_ms: sent.duration_ms,
            next_retry_at: transition.next_retry_at,
        }
    }
}

/// Read at most `cap` bytes of the response body. The rest is never
/// buffered; a body that fails mid-read keeps what arrived.
async fn read_capped(mut response: reqwest::Response, cap: usize) -> String {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < cap {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(cap - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    truncate_body(&String::from_utf8_lossy(&buf), cap)
}
