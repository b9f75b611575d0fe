//! Shared fixtures for webhook integration tests.
//!
//! Everything runs against [`MemoryStore`]; subscriber endpoints are
//! wiremock servers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hookline_core::secrets::PlaintextCipher;
use hookline_db::models::delivery::{DeliveryAttempt, DeliveryFilter, WebhookDelivery};
use hookline_db::models::subscription::{CreateWebhookSubscription, SubscriptionWithSecret};
use hookline_events::{DeliveryConfig, MemoryStore, WebhookSystem};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const TENANT_A: Uuid = Uuid::from_bytes([0x11; 16]);
pub const TENANT_B: Uuid = Uuid::from_bytes([0x22; 16]);

/// An address nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1/hook";

pub fn system() -> WebhookSystem {
    system_with(DeliveryConfig::default())
}

pub fn system_with(config: DeliveryConfig) -> WebhookSystem {
    WebhookSystem::new(
        Arc::new(MemoryStore::new()),
        Arc::new(PlaintextCipher),
        &config,
    )
    .unwrap()
}

pub fn subscription_input(url: &str, events: &[&str]) -> CreateWebhookSubscription {
    CreateWebhookSubscription {
        url: url.to_string(),
        events: events.iter().map(|e| e.to_string()).collect(),
        timeout: Some(5),
        ..Default::default()
    }
}

pub async fn subscribe(
    system: &WebhookSystem,
    tenant_id: Uuid,
    input: CreateWebhookSubscription,
) -> SubscriptionWithSecret {
    system.subscriptions.create(tenant_id, input).await.unwrap()
}

pub async fn deliveries_for(
    system: &WebhookSystem,
    tenant_id: Uuid,
    subscription_id: Uuid,
) -> Vec<WebhookDelivery> {
    let filter = DeliveryFilter {
        subscription_id: Some(subscription_id),
        ..Default::default()
    };
    system.store.list_deliveries(tenant_id, &filter).await.unwrap()
}

pub async fn attempts_for(
    system: &WebhookSystem,
    tenant_id: Uuid,
    delivery_id: Uuid,
) -> Vec<DeliveryAttempt> {
    system.store.list_attempts(tenant_id, delivery_id).await.unwrap()
}

// ---------------------------------------------------------------------------
// CaptureResponder
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub received_at: Instant,
}

impl CapturedRequest {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// Header value by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// A wiremock responder that records requests and answers with a fixed
/// status, optionally after a delay.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    status: u16,
    delay: Option<Duration>,
}

impl CaptureResponder {
    pub fn new() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            status,
            delay: None,
        }
    }

    /// Hold every response for `delay` after the request arrives.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_lowercase(),
                        v.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect(),
            received_at: Instant::now(),
        };
        self.requests.lock().unwrap().push(captured);
        let template = ResponseTemplate::new(self.status).set_body_string("ok");
        match self.delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}
