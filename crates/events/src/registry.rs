//! Catalog of known event types.
//!
//! Seeded from [`WebhookEventType`] and extended at runtime through
//! [`EventRegistry::register_event`]. Publishing an unknown type only logs a
//! warning unless the registry is strict.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use hookline_core::event_types::WebhookEventType;
use serde::Serialize;

use crate::error::WebhookError;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSchema {
    pub event_type: String,
    pub description: String,
    /// JSON schema of the `data` payload, when one is published.
    pub schema: Option<serde_json::Value>,
    pub example: Option<serde_json::Value>,
}

pub struct EventRegistry {
    entries: RwLock<BTreeMap<String, EventSchema>>,
    strict: bool,
}

impl EventRegistry {
    /// A registry seeded with the built-in catalog.
    pub fn new(strict: bool) -> Self {
        let entries = WebhookEventType::ALL
            .into_iter()
            .map(|t| {
                let entry = EventSchema {
                    event_type: t.as_str().to_string(),
                    description: t.description().to_string(),
                    schema: None,
                    example: Some(t.example()),
                };
                (entry.event_type.clone(), entry)
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
            strict,
        }
    }

    /// A registry with no entries.
    pub fn empty(strict: bool) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Add an event type to the catalog.
    ///
    /// Returns `false` (and logs a warning) if the type is already
    /// registered; the existing entry is kept.
    pub fn register_event(
        &self,
        event_type: impl Into<String>,
        description: impl Into<String>,
        schema: Option<serde_json::Value>,
        example: Option<serde_json::Value>,
    ) -> bool {
        let event_type = event_type.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&event_type) {
            tracing::warn!(event_type = %event_type, "Event type already registered, ignoring");
            return false;
        }
        entries.insert(
            event_type.clone(),
            EventSchema {
                event_type: event_type.clone(),
                description: description.into(),
                schema,
                example,
            },
        );
        tracing::debug!(event_type = %event_type, "Registered event type");
        true
    }

    pub fn get(&self, event_type: &str) -> Option<EventSchema> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(event_type)
    }

    /// All entries, ordered by event type.
    pub fn list(&self) -> Vec<EventSchema> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Gate a publish of `event_type`: unknown types are rejected in strict
    /// mode and logged otherwise.
    pub fn check_publish(&self, event_type: &str) -> Result<(), WebhookError> {
        if self.is_registered(event_type) {
            return Ok(());
        }
        if self.strict {
            return Err(WebhookError::UnknownEventType(event_type.to_string()));
        }
        tracing::warn!(event_type, "Publishing unregistered event type");
        Ok(())
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}
