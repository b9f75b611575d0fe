//! Event bus: fans a published event out to every matching subscription.

use std::sync::Arc;

use hookline_core::types::TenantId;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::delivery::DeliveryEngine;
use crate::error::WebhookError;
use crate::registry::EventRegistry;
use crate::subscriptions::SubscriptionService;

// ---------------------------------------------------------------------------
// DomainEvent
// ---------------------------------------------------------------------------

/// A domain event to publish.
///
/// Two publishes of the same business event should carry the same
/// [`event_id`](Self::with_event_id) if receivers are to deduplicate them;
/// the bus does not detect duplicate publishes.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub tenant_id: TenantId,
    pub event_type: String,
    pub data: serde_json::Value,
    pub event_id: Option<String>,
}

impl DomainEvent {
    pub fn new(tenant_id: TenantId, event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            tenant_id,
            event_type: event_type.into(),
            data,
            event_id: None,
        }
    }

    /// Set the idempotency key instead of letting the bus generate one.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Publishes events to tenant subscriptions.
///
/// [`publish`](Self::publish) awaits the first attempt of every matched
/// subscription before returning. Concurrency across subscribers is bounded
/// by a semaphore shared by all publishes on this bus.
#[derive(Clone)]
pub struct EventBus {
    engine: DeliveryEngine,
    subscriptions: SubscriptionService,
    registry: Arc<EventRegistry>,
    semaphore: Arc<Semaphore>,
}

impl EventBus {
    pub fn new(
        engine: DeliveryEngine,
        subscriptions: SubscriptionService,
        registry: Arc<EventRegistry>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            engine,
            subscriptions,
            registry,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Deliver `event` to all active subscriptions of its tenant that listen
    /// for its type.
    ///
    /// Each subscription is read again once a send slot is free, so a
    /// secret rotated or a subscription disabled while the send was queued
    /// takes effect.
    ///
    /// Returns the number of subscriptions attempted, regardless of how
    /// each attempt went. Fails only if the event type is rejected (strict
    /// mode) or the subscriptions cannot be looked up.
    pub async fn publish(&self, event: DomainEvent) -> Result<usize, WebhookError> {
        self.registry.check_publish(&event.event_type)?;

        let subscriptions = self
            .subscriptions
            .matching(event.tenant_id, &event.event_type)
            .await?;
        if subscriptions.is_empty() {
            tracing::debug!(
                tenant_id = %event.tenant_id,
                event_type = %event.event_type,
                "No active subscriptions match event"
            );
            return Ok(0);
        }

        let event_id = event
            .event_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let event_type: Arc<str> = Arc::from(event.event_type);
        let data = Arc::new(event.data);
        let count = subscriptions.len();

        tracing::info!(
            tenant_id = %event.tenant_id,
            event_type = %event_type,
            event_id = %event_id,
            subscription_count = count,
            "Publishing event"
        );

        let mut tasks = JoinSet::new();
        for matched in subscriptions {
            let engine = self.engine.clone();
            let subscriptions = self.subscriptions.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let event_type = Arc::clone(&event_type);
            let data = Arc::clone(&data);
            let event_id = event_id.clone();
            let tenant_id = event.tenant_id;
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return false;
                };
                let subscription = match subscriptions.active(tenant_id, matched.id).await {
                    Ok(Some(subscription)) => subscription,
                    Ok(None) => {
                        tracing::info!(
                            subscription_id = %matched.id,
                            event_id = %event_id,
                            "Subscription disabled or removed before delivery, skipping"
                        );
                        return false;
                    }
                    Err(e) => {
                        tracing::error!(
                            subscription_id = %matched.id,
                            event_id = %event_id,
                            error = %e,
                            "Failed to reload subscription, skipping delivery"
                        );
                        return false;
                    }
                };
                engine
                    .attempt(&subscription, &event_type, &data, &event_id, tenant_id)
                    .await;
                true
            });
        }

        let mut attempted = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => attempted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(event_id = %event_id, error = %e, "Delivery task panicked")
                }
            }
        }

        Ok(attempted)
    }

    /// Add an event type to the catalog. Re-registering is a no-op.
    pub fn register_event(
        &self,
        event_type: impl Into<String>,
        description: impl Into<String>,
        schema: Option<serde_json::Value>,
        example: Option<serde_json::Value>,
    ) -> bool {
        self.registry
            .register_event(event_type, description, schema, example)
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_event_builder() {
        let tenant = uuid::Uuid::new_v4();
        let event = DomainEvent::new(tenant, "invoice.paid", serde_json::json!({"id": 1}));
        assert!(event.event_id.is_none());

        let event = event.with_event_id("evt_42");
        assert_eq!(event.event_id.as_deref(), Some("evt_42"));
        assert_eq!(event.event_type, "invoice.paid");
    }
}
