//! Delivery engine scenarios against live wiremock endpoints.

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use common::*;
use hookline_core::delivery::{
    DeliveryStatus, GONE_DISABLE_REASON, GONE_ERROR_MESSAGE, RESPONSE_BODY_CAP,
};
use hookline_core::error::CoreError;
use hookline_core::signing::verify;
use hookline_events::{DomainEvent, WebhookError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Successful delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delivered_request_is_signed_over_the_exact_body() {
    let server = MockServer::start().await;
    let responder = CaptureResponder::new();
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let system = system();
    let created = subscribe(
        &system,
        TENANT_A,
        subscription_input(&format!("{}/hook", server.uri()), &["user.created"]),
    )
    .await;

    let event = DomainEvent::new(TENANT_A, "user.created", json!({"user_id": "u-1"}))
        .with_event_id("evt-signed");
    assert_eq!(system.bus.publish(event).await.unwrap(), 1);

    let requests = responder.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let signature = request.header("x-webhook-signature").unwrap();
    assert!(verify(&request.body, signature, &created.secret));
    assert_eq!(request.header("x-webhook-event-id"), Some("evt-signed"));
    assert_eq!(request.header("x-webhook-event-type"), Some("user.created"));
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert!(request.header("x-webhook-timestamp").is_some());

    let body = request.body_json();
    assert_eq!(body["id"], "evt-signed");
    assert_eq!(body["type"], "user.created");
    assert_eq!(body["data"]["user_id"], "u-1");
    assert_eq!(body["tenant_id"], TENANT_A.to_string());
    assert_eq!(body["timestamp"], request.header("x-webhook-timestamp").unwrap());
}

#[tokio::test]
async fn successful_delivery_is_recorded_and_counted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("thanks"))
        .mount(&server)
        .await;

    let system = system();
    let created = subscribe(
        &system,
        TENANT_A,
        subscription_input(&server.uri(), &["invoice.paid"]),
    )
    .await;
    let id = created.subscription.id;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "invoice.paid", json!({"invoice_id": "inv-1"})))
        .await
        .unwrap();

    let deliveries = deliveries_for(&system, TENANT_A, id).await;
    assert_eq!(deliveries.len(), 1);
    let delivery = &deliveries[0];
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.response_code, Some(200));
    assert_eq!(delivery.response_body.as_deref(), Some("thanks"));
    assert_eq!(delivery.attempt_number, 1);
    assert!(delivery.next_retry_at.is_none());
    assert!(delivery.error_message.is_none());

    let attempts = attempts_for(&system, TENANT_A, delivery.id).await;
    assert_eq!(attempts.len(), 1);

    let sub = system.subscriptions.get(TENANT_A, id).await.unwrap();
    assert_eq!(sub.success_count, 1);
    assert_eq!(sub.failure_count, 0);
    assert!(sub.last_success_at.is_some());
    assert!(sub.last_triggered_at.is_some());
}

#[tokio::test]
async fn custom_headers_are_sent_with_the_request() {
    let server = MockServer::start().await;
    let responder = CaptureResponder::new();
    Mock::given(method("POST"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let system = system();
    let mut input = subscription_input(&server.uri(), &["user.updated"]);
    input.headers = BTreeMap::from([("Authorization".to_string(), "Bearer sub-token".to_string())]);
    subscribe(&system, TENANT_A, input).await;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "user.updated", json!({})))
        .await
        .unwrap();

    let requests = responder.requests();
    assert_eq!(requests[0].header("authorization"), Some("Bearer sub-token"));
}

// ---------------------------------------------------------------------------
// Failures and retries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persistent_503_exhausts_retries_then_fails() {
    let server = MockServer::start().await;
    let responder = CaptureResponder::with_status(503);
    Mock::given(method("POST"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let system = system();
    let mut input = subscription_input(&server.uri(), &["payment.failed"]);
    input.max_retries = Some(2);
    let id = subscribe(&system, TENANT_A, input).await.subscription.id;

    let start = Utc::now();
    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "payment.failed", json!({"payment_id": "p-1"})))
        .await
        .unwrap();

    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert_eq!(delivery.error_message.as_deref(), Some("endpoint returned 503"));
    let first_retry = delivery.next_retry_at.unwrap();
    assert!(first_retry >= start + chrono::Duration::minutes(5));
    assert!(first_retry <= Utc::now() + chrono::Duration::minutes(5));

    // Not due yet.
    let sweep = system.scheduler.process_due(Utc::now(), 10).await.unwrap();
    assert_eq!(sweep.claimed, 0);

    let sweep = system
        .scheduler
        .process_due(start + chrono::Duration::minutes(6), 10)
        .await
        .unwrap();
    assert_eq!(sweep.attempted, 1);

    let delivery = system.store.find_delivery(TENANT_A, delivery.id).await.unwrap().unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert_eq!(delivery.attempt_number, 2);
    assert!(delivery.next_retry_at.unwrap() >= start + chrono::Duration::hours(1));

    let sweep = system
        .scheduler
        .process_due(start + chrono::Duration::hours(2), 10)
        .await
        .unwrap();
    assert_eq!(sweep.attempted, 1);

    let delivery = system.store.find_delivery(TENANT_A, delivery.id).await.unwrap().unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempt_number, 3);
    assert!(delivery.next_retry_at.is_none());

    // Nothing left to claim however far ahead we look.
    let sweep = system
        .scheduler
        .process_due(start + chrono::Duration::days(2), 10)
        .await
        .unwrap();
    assert_eq!(sweep.claimed, 0);

    let attempts = attempts_for(&system, TENANT_A, delivery.id).await;
    assert_eq!(
        attempts.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(attempts.iter().all(|a| a.response_code == Some(503)));

    let requests = responder.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|r| r.header("x-webhook-event-id") == Some(delivery.event_id.as_str())));

    let sub = system.subscriptions.get(TENANT_A, id).await.unwrap();
    assert_eq!(sub.failure_count, 3);
    assert_eq!(sub.success_count, 0);
    assert!(sub.is_active);
}

#[tokio::test]
async fn retry_disabled_fails_after_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let system = system();
    let mut input = subscription_input(&server.uri(), &["email.bounced"]);
    input.retry_enabled = Some(false);
    let id = subscribe(&system, TENANT_A, input).await.subscription.id;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "email.bounced", json!({})))
        .await
        .unwrap();

    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert!(delivery.next_retry_at.is_none());

    let sweep = system
        .scheduler
        .process_due(Utc::now() + chrono::Duration::days(1), 10)
        .await
        .unwrap();
    assert_eq!(sweep.claimed, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn gone_disables_the_subscription_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let system = system();
    let id = subscribe(
        &system,
        TENANT_A,
        subscription_input(&server.uri(), &["user.deleted"]),
    )
    .await
    .subscription
    .id;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "user.deleted", json!({})))
        .await
        .unwrap();

    let deliveries = deliveries_for(&system, TENANT_A, id).await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, DeliveryStatus::Disabled);
    assert_eq!(deliveries[0].error_message.as_deref(), Some(GONE_ERROR_MESSAGE));
    assert!(deliveries[0].next_retry_at.is_none());
    assert_eq!(attempts_for(&system, TENANT_A, deliveries[0].id).await.len(), 1);

    let sub = system.subscriptions.get(TENANT_A, id).await.unwrap();
    assert!(!sub.is_active);
    assert_eq!(sub.disabled_reason(), Some(GONE_DISABLE_REASON));

    // A disabled subscription no longer matches.
    let count = system
        .bus
        .publish(DomainEvent::new(TENANT_A, "user.deleted", json!({})))
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn gone_on_a_retry_stops_the_remaining_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let system = system();
    let mut input = subscription_input(&server.uri(), &["invoice.overdue"]);
    input.max_retries = Some(5);
    let id = subscribe(&system, TENANT_A, input).await.subscription.id;

    let start = Utc::now();
    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "invoice.overdue", json!({"invoice_id": "inv-3"})))
        .await
        .unwrap();
    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Retrying);

    let sweep = system
        .scheduler
        .process_due(start + chrono::Duration::minutes(6), 10)
        .await
        .unwrap();
    assert_eq!(sweep.attempted, 1);

    let delivery = system.store.find_delivery(TENANT_A, delivery.id).await.unwrap().unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Disabled);
    assert_eq!(delivery.attempt_number, 2);
    assert_eq!(delivery.error_message.as_deref(), Some(GONE_ERROR_MESSAGE));
    assert!(delivery.next_retry_at.is_none());

    let sub = system.subscriptions.get(TENANT_A, id).await.unwrap();
    assert!(!sub.is_active);
    assert_eq!(sub.disabled_reason(), Some(GONE_DISABLE_REASON));

    // Four retries were still allowed; none are ever claimed.
    let sweep = system
        .scheduler
        .process_due(start + chrono::Duration::days(2), 10)
        .await
        .unwrap();
    assert_eq!(sweep.claimed, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(attempts_for(&system, TENANT_A, delivery.id).await.len(), 2);
}

#[tokio::test]
async fn large_response_bodies_are_stored_capped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(1 << 20)))
        .mount(&server)
        .await;

    let system = system();
    let id = subscribe(&system, TENANT_A, subscription_input(&server.uri(), &["email.sent"]))
        .await
        .subscription
        .id;
    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "email.sent", json!({})))
        .await
        .unwrap();

    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.response_body, Some("a".repeat(RESPONSE_BODY_CAP)));
}

#[tokio::test]
async fn unreachable_endpoint_records_connection_error() {
    let system = system();
    let id = subscribe(&system, TENANT_A, subscription_input(UNREACHABLE_URL, &["sms.sent"]))
        .await
        .subscription
        .id;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "sms.sent", json!({})))
        .await
        .unwrap();

    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert!(delivery.response_code.is_none());
    assert!(delivery.error_message.is_some());
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(8)))
        .mount(&server)
        .await;

    let system = system();
    let id = subscribe(
        &system,
        TENANT_A,
        subscription_input(&server.uri(), &["tenant.updated"]),
    )
    .await
    .subscription
    .id;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "tenant.updated", json!({})))
        .await
        .unwrap();

    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert!(delivery.response_code.is_none());
    assert_eq!(
        delivery.error_message.as_deref(),
        Some("request timed out after 5s")
    );
}

// ---------------------------------------------------------------------------
// Manual retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manual_retry_resends_failed_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let system = system();
    let mut input = subscription_input(&server.uri(), &["invoice.overdue"]);
    input.retry_enabled = Some(false);
    let id = subscribe(&system, TENANT_A, input).await.subscription.id;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "invoice.overdue", json!({})))
        .await
        .unwrap();
    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Failed);

    assert!(system.engine.retry_delivery(delivery.id, TENANT_A).await.unwrap());

    let delivery = system.store.find_delivery(TENANT_A, delivery.id).await.unwrap().unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempt_number, 2);
    assert_eq!(attempts_for(&system, TENANT_A, delivery.id).await.len(), 2);

    // Already delivered: nothing to do.
    assert!(!system.engine.retry_delivery(delivery.id, TENANT_A).await.unwrap());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn manual_retry_skips_inactive_subscription() {
    let system = system();
    let mut input = subscription_input(UNREACHABLE_URL, &["payment.succeeded"]);
    input.retry_enabled = Some(false);
    let id = subscribe(&system, TENANT_A, input).await.subscription.id;

    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "payment.succeeded", json!({})))
        .await
        .unwrap();
    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);

    system.subscriptions.disable(TENANT_A, id, "paused").await.unwrap();
    assert!(!system.engine.retry_delivery(delivery.id, TENANT_A).await.unwrap());

    let unchanged = system.store.find_delivery(TENANT_A, delivery.id).await.unwrap().unwrap();
    assert_eq!(unchanged.attempt_number, 1);
}

#[tokio::test]
async fn manual_retry_is_tenant_scoped() {
    let system = system();
    let id = subscribe(&system, TENANT_A, subscription_input(UNREACHABLE_URL, &["sms.sent"]))
        .await
        .subscription
        .id;
    system
        .bus
        .publish(DomainEvent::new(TENANT_A, "sms.sent", json!({})))
        .await
        .unwrap();
    let delivery = deliveries_for(&system, TENANT_A, id).await.remove(0);

    let result = system.engine.retry_delivery(delivery.id, TENANT_B).await;
    assert_matches!(
        result,
        Err(WebhookError::Core(CoreError::NotFound { entity: "webhook_delivery", .. }))
    );
}

// ---------------------------------------------------------------------------
// Test delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_test_delivers_synthetic_event() {
    let server = MockServer::start().await;
    let responder = CaptureResponder::new();
    Mock::given(method("POST"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let system = system();
    let id = subscribe(
        &system,
        TENANT_A,
        subscription_input(&server.uri(), &["invoice.paid"]),
    )
    .await
    .subscription
    .id;

    let outcome = system.engine.send_test(TENANT_A, id).await.unwrap();
    assert_eq!(outcome.status, DeliveryStatus::Success);
    assert_eq!(outcome.response_code, Some(200));
    assert_eq!(outcome.attempt_number, 1);

    let requests = responder.requests();
    assert_eq!(requests[0].header("x-webhook-event-type"), Some("webhook.test"));
    assert_eq!(requests[0].body_json()["data"]["subscription_id"], id.to_string());

    let deliveries = deliveries_for(&system, TENANT_A, id).await;
    assert_eq!(deliveries[0].event_type, "webhook.test");
}

#[tokio::test]
async fn send_test_unknown_subscription_is_not_found() {
    let system = system();
    let result = system.engine.send_test(TENANT_A, uuid::Uuid::new_v4()).await;
    assert_matches!(result, Err(WebhookError::Core(CoreError::NotFound { .. })));
}
