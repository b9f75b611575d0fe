//! Shared helpers for API integration tests.
//!
//! The app runs on the in-memory store with plaintext secrets, so no
//! database is needed. Subscriber endpoints are wiremock servers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use hookline_api::auth::jwt::{generate_access_token, JwtConfig};
use hookline_api::config::ServerConfig;
use hookline_api::router::build_app_router;
use hookline_api::state::AppState;
use hookline_core::secrets::PlaintextCipher;
use hookline_events::{DeliveryConfig, MemoryStore, WebhookSystem};
use tower::ServiceExt;
use uuid::Uuid;

pub const TENANT_A: Uuid = Uuid::from_bytes([0xaa; 16]);
pub const TENANT_B: Uuid = Uuid::from_bytes([0xbb; 16]);

const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_max_connections: 1,
        retry_sweep_enabled: false,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// A router plus the webhook services behind it, for assertions that go
/// around the HTTP layer.
pub struct TestApp {
    pub router: Router,
    pub webhooks: WebhookSystem,
}

/// Build the full application with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let webhooks = WebhookSystem::new(
        Arc::new(MemoryStore::new()),
        Arc::new(PlaintextCipher),
        &DeliveryConfig::default(),
    )
    .unwrap();

    let state = AppState {
        config: Arc::new(config.clone()),
        webhooks: webhooks.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        webhooks,
    }
}

/// A valid bearer token for a fresh user in `tenant_id`.
pub fn token_for(tenant_id: Uuid) -> String {
    generate_access_token(Uuid::new_v4(), tenant_id, &test_config().jwt).unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    tenant_id: Option<Uuid>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant_id) = tenant_id {
        builder = builder.header("Authorization", format!("Bearer {}", token_for(tenant_id)));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str, tenant_id: Uuid) -> Response<Body> {
    send(app, Method::GET, uri, Some(tenant_id), None).await
}

pub async fn post(
    app: &TestApp,
    uri: &str,
    tenant_id: Uuid,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(tenant_id), Some(body)).await
}

pub async fn put(
    app: &TestApp,
    uri: &str,
    tenant_id: Uuid,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(tenant_id), Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str, tenant_id: Uuid) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(tenant_id), None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a subscription through the API and return its `data` object.
pub async fn create_subscription(
    app: &TestApp,
    tenant_id: Uuid,
    url: &str,
    events: &[&str],
) -> serde_json::Value {
    let response = post(
        app,
        "/api/v1/webhooks/subscriptions",
        tenant_id,
        serde_json::json!({ "url": url, "events": events, "timeout": 5 }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}
