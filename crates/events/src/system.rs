//! Composition root for the webhook services.

use std::sync::Arc;

use hookline_core::secrets::SecretCipher;

use crate::bus::EventBus;
use crate::config::DeliveryConfig;
use crate::delivery::DeliveryEngine;
use crate::error::WebhookError;
use crate::registry::EventRegistry;
use crate::retry::RetryScheduler;
use crate::store::WebhookStore;
use crate::subscriptions::SubscriptionService;

/// All webhook services wired around one store and one cipher.
///
/// Construct one per process and share it; tests build their own.
#[derive(Clone)]
pub struct WebhookSystem {
    pub store: Arc<dyn WebhookStore>,
    pub registry: Arc<EventRegistry>,
    pub subscriptions: SubscriptionService,
    pub engine: DeliveryEngine,
    pub bus: EventBus,
    pub scheduler: RetryScheduler,
}

impl WebhookSystem {
    pub fn new(
        store: Arc<dyn WebhookStore>,
        cipher: Arc<dyn SecretCipher>,
        config: &DeliveryConfig,
    ) -> Result<Self, WebhookError> {
        let registry = Arc::new(EventRegistry::new(config.strict_event_types));
        let subscriptions =
            SubscriptionService::new(Arc::clone(&store), cipher, Arc::clone(&registry));
        let engine = DeliveryEngine::new(
            Arc::clone(&store),
            subscriptions.clone(),
            &config.user_agent,
        )?;
        let bus = EventBus::new(
            engine.clone(),
            subscriptions.clone(),
            Arc::clone(&registry),
            config.max_concurrency,
        );
        let scheduler = RetryScheduler::new(engine.clone(), Arc::clone(&store), config);

        Ok(Self {
            store,
            registry,
            subscriptions,
            engine,
            bus,
            scheduler,
        })
    }
}
