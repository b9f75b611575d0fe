//! Hookline webhook distribution.
//!
//! This crate turns domain events into signed, retried HTTP deliveries to
//! tenant-registered endpoints:
//!
//! - [`SubscriptionService`] -- registry of webhook endpoints per tenant.
//! - [`EventRegistry`] -- catalog of known event types.
//! - [`DeliveryEngine`] -- one signed HTTP attempt plus its state transition.
//! - [`RetryScheduler`] -- background sweep that resumes due retries.
//! - [`EventBus`] -- fans a published event out to matching subscriptions.
//! - [`WebhookSystem`] -- wires all of the above around one store.

pub mod bus;
pub mod config;
pub mod delivery;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod registry;
pub mod retry;
pub mod store;
pub mod subscriptions;
pub mod system;

pub use bus::{DomainEvent, EventBus};
pub use config::{secret_cipher_from_env, DeliveryConfig};
pub use delivery::{DeliveryEngine, DeliveryOutcome};
pub use envelope::EventEnvelope;
pub use error::WebhookError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use registry::{EventRegistry, EventSchema};
pub use retry::{RetryScheduler, RetrySweep};
pub use store::{DeliveryStore, SubscriptionStore, WebhookStore};
pub use subscriptions::SubscriptionService;
pub use system::WebhookSystem;
