//! Subscription registry: validation, secret handling and bookkeeping on
//! top of a [`SubscriptionStore`](crate::store::SubscriptionStore).

use std::sync::Arc;

use chrono::Utc;
use hookline_core::error::CoreError;
use hookline_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use hookline_core::secrets::{SecretCipher, SecretError};
use hookline_core::signing::{generate_secret, secret_hint};
use hookline_core::types::{DbId, TenantId};
use hookline_core::validation::{
    normalize_events, validate_headers, validate_max_retries, validate_timeout_secs, validate_url,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_ENABLED, DEFAULT_TIMEOUT_SECS,
};
use hookline_db::models::subscription::{
    CreateWebhookSubscription, NewSubscription, RotatedSecret, SubscriptionWithSecret,
    UpdateWebhookSubscription, WebhookSubscription,
};

use crate::error::WebhookError;
use crate::registry::EventRegistry;
use crate::store::WebhookStore;

const ENTITY: &str = "webhook_subscription";

/// Manages a tenant's webhook endpoints.
///
/// Secrets are sealed with the configured [`SecretCipher`] before they reach
/// the store. The plaintext is returned only by [`create`](Self::create) and
/// [`rotate_secret`](Self::rotate_secret).
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn WebhookStore>,
    cipher: Arc<dyn SecretCipher>,
    registry: Arc<EventRegistry>,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<dyn WebhookStore>,
        cipher: Arc<dyn SecretCipher>,
        registry: Arc<EventRegistry>,
    ) -> Self {
        Self {
            store,
            cipher,
            registry,
        }
    }

    /// Register a new endpoint. The returned secret is never shown again.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        input: CreateWebhookSubscription,
    ) -> Result<SubscriptionWithSecret, WebhookError> {
        validate_url(&input.url)?;
        let events = self.checked_events(&input.events)?;
        validate_headers(&input.headers)?;
        let max_retries = input.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        validate_max_retries(max_retries)?;
        let timeout_secs = input.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        validate_timeout_secs(timeout_secs)?;

        let secret = generate_secret();
        let new = NewSubscription {
            id: uuid::Uuid::now_v7(),
            tenant_id,
            url: input.url,
            events,
            secret: self.cipher.seal(&secret)?,
            headers: input.headers,
            retry_enabled: input.retry_enabled.unwrap_or(DEFAULT_RETRY_ENABLED),
            max_retries,
            timeout_secs,
        };
        let subscription = self.store.insert_subscription(&new).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            tenant_id = %tenant_id,
            events = ?subscription.events,
            "Webhook subscription created"
        );

        Ok(SubscriptionWithSecret {
            subscription,
            secret,
        })
    }

    /// Fetch one subscription. Ids from other tenants are reported as not found.
    pub async fn get(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<WebhookSubscription, WebhookError> {
        self.store
            .find_subscription(tenant_id, id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list(
        &self,
        tenant_id: TenantId,
        is_active: Option<bool>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<WebhookSubscription>, WebhookError> {
        let limit = clamp_limit(limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(offset);
        Ok(self
            .store
            .list_subscriptions(tenant_id, is_active, limit, offset)
            .await?)
    }

    /// Active subscriptions of `tenant_id` that listen for `event_type`.
    pub async fn matching(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>, WebhookError> {
        Ok(self.store.matching_subscriptions(tenant_id, event_type).await?)
    }

    /// Current state of a subscription that may still receive deliveries.
    /// `None` when it has been disabled or deleted.
    pub async fn active(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookSubscription>, WebhookError> {
        Ok(self
            .store
            .find_subscription(tenant_id, id)
            .await?
            .filter(|subscription| subscription.is_active))
    }

    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: DbId,
        mut input: UpdateWebhookSubscription,
    ) -> Result<WebhookSubscription, WebhookError> {
        if let Some(ref url) = input.url {
            validate_url(url)?;
        }
        if let Some(events) = input.events.take() {
            input.events = Some(self.checked_events(&events)?);
        }
        if let Some(ref headers) = input.headers {
            validate_headers(headers)?;
        }
        if let Some(max_retries) = input.max_retries {
            validate_max_retries(max_retries)?;
        }
        if let Some(timeout) = input.timeout {
            validate_timeout_secs(timeout)?;
        }

        let updated = self
            .store
            .update_subscription(tenant_id, id, &input)
            .await?
            .ok_or_else(|| not_found(id))?;

        tracing::info!(subscription_id = %id, tenant_id = %tenant_id, "Webhook subscription updated");
        Ok(updated)
    }

    /// Hard delete; the subscription's deliveries go with it.
    pub async fn delete(&self, tenant_id: TenantId, id: DbId) -> Result<(), WebhookError> {
        if !self.store.delete_subscription(tenant_id, id).await? {
            return Err(not_found(id));
        }
        tracing::info!(subscription_id = %id, tenant_id = %tenant_id, "Webhook subscription deleted");
        Ok(())
    }

    /// Replace the signing secret. The old one stops signing immediately.
    pub async fn rotate_secret(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<RotatedSecret, WebhookError> {
        let current = self.get(tenant_id, id).await?;
        let previous_hint = match self.cipher.open(&current.secret) {
            Ok(previous) => secret_hint(&previous),
            Err(e) => {
                tracing::warn!(subscription_id = %id, error = %e, "Could not open previous secret");
                String::new()
            }
        };

        let secret = generate_secret();
        let sealed = self.cipher.seal(&secret)?;
        let rotated_at = Utc::now();
        self.store
            .rotate_subscription_secret(tenant_id, id, &sealed, &previous_hint, rotated_at)
            .await?
            .ok_or_else(|| not_found(id))?;

        tracing::info!(subscription_id = %id, tenant_id = %tenant_id, "Webhook secret rotated");

        Ok(RotatedSecret {
            subscription_id: id,
            secret,
            rotated_at,
        })
    }

    /// Deactivate a subscription and record why. Idempotent: returns `false`
    /// when it was already inactive.
    pub async fn disable(
        &self,
        tenant_id: TenantId,
        id: DbId,
        reason: &str,
    ) -> Result<bool, WebhookError> {
        let disabled = self
            .store
            .deactivate_subscription(tenant_id, id, reason, Utc::now())
            .await?;
        if disabled {
            tracing::warn!(subscription_id = %id, tenant_id = %tenant_id, reason, "Webhook subscription disabled");
        }
        Ok(disabled)
    }

    /// Update delivery statistics. Failures are logged, never returned.
    pub async fn record_outcome(&self, tenant_id: TenantId, id: DbId, success: bool) {
        if let Err(e) = self
            .store
            .record_subscription_outcome(tenant_id, id, success)
            .await
        {
            tracing::error!(
                subscription_id = %id,
                tenant_id = %tenant_id,
                success,
                error = %e,
                "Failed to record delivery outcome"
            );
        }
    }

    /// The plaintext secret used to sign deliveries for `subscription`.
    pub fn signing_secret(&self, subscription: &WebhookSubscription) -> Result<String, SecretError> {
        self.cipher.open(&subscription.secret)
    }

    /// Normalize subscribed events; in strict mode every type must be known.
    fn checked_events(&self, events: &[String]) -> Result<Vec<String>, CoreError> {
        let events = normalize_events(events)?;
        if self.registry.is_strict() {
            if let Some(unknown) = events.iter().find(|e| !self.registry.is_registered(e)) {
                return Err(CoreError::Validation(format!(
                    "unknown event type '{unknown}'"
                )));
            }
        }
        Ok(events)
    }
}

fn not_found(id: DbId) -> WebhookError {
    WebhookError::Core(CoreError::NotFound { entity: ENTITY, id })
}
