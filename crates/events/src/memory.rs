//! In-process store for tests and single-node development.
//!
//! Claim timestamps are stored at microsecond precision, as Postgres does.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use hookline_core::delivery::{claim_stamp, DeliveryStatus};
use hookline_core::types::{DbId, TenantId, Timestamp};
use hookline_db::models::delivery::{
    AttemptRecord, DeliveryAttempt, DeliveryFilter, NewDelivery, WebhookDelivery,
};
use hookline_db::models::subscription::{
    metadata_keys, NewSubscription, UpdateWebhookSubscription, WebhookSubscription,
};
use serde_json::{json, Value};
use sqlx::types::Json;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    subscriptions: BTreeMap<DbId, WebhookSubscription>,
    deliveries: BTreeMap<DbId, WebhookDelivery>,
    attempts: Vec<DeliveryAttempt>,
}

/// Keeps subscriptions, deliveries and attempts behind a single lock, so
/// every operation (claims included) is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn merge_metadata<const N: usize>(metadata: &mut Value, entries: [(&str, Value); N]) {
    if !metadata.is_object() {
        *metadata = json!({});
    }
    if let Some(target) = metadata.as_object_mut() {
        for (key, value) in entries {
            target.insert(key.to_string(), value);
        }
    }
}

#[async_trait]
impl crate::store::SubscriptionStore for MemoryStore {
    async fn insert_subscription(
        &self,
        input: &NewSubscription,
    ) -> Result<WebhookSubscription, sqlx::Error> {
        let now = Utc::now();
        let subscription = WebhookSubscription {
            id: input.id,
            tenant_id: input.tenant_id,
            url: input.url.clone(),
            events: input.events.clone(),
            secret: input.secret.clone(),
            headers: Json(input.headers.clone()),
            is_active: true,
            retry_enabled: input.retry_enabled,
            max_retries: input.max_retries,
            timeout_secs: input.timeout_secs,
            success_count: 0,
            failure_count: 0,
            last_triggered_at: None,
            last_success_at: None,
            last_failure_at: None,
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.lock().await;
        tables.subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn find_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .subscriptions
            .get(&id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_subscriptions(
        &self,
        tenant_id: TenantId,
        is_active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<WebhookSubscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .filter(|s| is_active.map_or(true, |active| s.is_active == active))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn matching_subscriptions(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<WebhookSubscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.is_active && s.subscribes_to(event_type))
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.created_at, s.id));
        Ok(rows)
    }

    async fn update_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
        input: &UpdateWebhookSubscription,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let Some(sub) = tables
            .subscriptions
            .get_mut(&id)
            .filter(|s| s.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        if let Some(ref url) = input.url {
            sub.url = url.clone();
        }
        if let Some(ref events) = input.events {
            sub.events = events.clone();
        }
        if let Some(ref headers) = input.headers {
            sub.headers = Json(headers.clone());
        }
        if let Some(retry_enabled) = input.retry_enabled {
            sub.retry_enabled = retry_enabled;
        }
        if let Some(max_retries) = input.max_retries {
            sub.max_retries = max_retries;
        }
        if let Some(timeout) = input.timeout {
            sub.timeout_secs = timeout;
        }
        if let Some(is_active) = input.is_active {
            sub.is_active = is_active;
            if is_active {
                if let Some(metadata) = sub.metadata.as_object_mut() {
                    metadata.remove(metadata_keys::DISABLED_REASON);
                    metadata.remove(metadata_keys::DISABLED_AT);
                }
            }
        }
        sub.updated_at = Utc::now();
        Ok(Some(sub.clone()))
    }

    async fn delete_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let owned = tables
            .subscriptions
            .get(&id)
            .is_some_and(|s| s.tenant_id == tenant_id);
        if !owned {
            return Ok(false);
        }
        tables.subscriptions.remove(&id);

        let removed: Vec<DbId> = tables
            .deliveries
            .values()
            .filter(|d| d.subscription_id == id)
            .map(|d| d.id)
            .collect();
        tables.deliveries.retain(|_, d| d.subscription_id != id);
        tables.attempts.retain(|a| !removed.contains(&a.delivery_id));
        Ok(true)
    }

    async fn rotate_subscription_secret(
        &self,
        tenant_id: TenantId,
        id: DbId,
        sealed_secret: &str,
        previous_hint: &str,
        rotated_at: Timestamp,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let Some(sub) = tables
            .subscriptions
            .get_mut(&id)
            .filter(|s| s.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        let count = sub
            .metadata
            .get(metadata_keys::SECRET_ROTATION_COUNT)
            .and_then(Value::as_i64)
            .unwrap_or(0)
            + 1;
        sub.secret = sealed_secret.to_string();
        merge_metadata(
            &mut sub.metadata,
            [
                (metadata_keys::SECRET_ROTATED_AT, json!(rotated_at)),
                (metadata_keys::SECRET_ROTATION_COUNT, json!(count)),
                (metadata_keys::PREVIOUS_SECRET_HINT, json!(previous_hint)),
            ],
        );
        sub.updated_at = Utc::now();
        Ok(Some(sub.clone()))
    }

    async fn deactivate_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
        reason: &str,
        disabled_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let Some(sub) = tables
            .subscriptions
            .get_mut(&id)
            .filter(|s| s.tenant_id == tenant_id && s.is_active)
        else {
            return Ok(false);
        };

        sub.is_active = false;
        merge_metadata(
            &mut sub.metadata,
            [
                (metadata_keys::DISABLED_REASON, json!(reason)),
                (metadata_keys::DISABLED_AT, json!(disabled_at)),
            ],
        );
        sub.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_subscription_outcome(
        &self,
        tenant_id: TenantId,
        id: DbId,
        success: bool,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;
        if let Some(sub) = tables
            .subscriptions
            .get_mut(&id)
            .filter(|s| s.tenant_id == tenant_id)
        {
            sub.last_triggered_at = Some(now);
            if success {
                sub.success_count += 1;
                sub.last_success_at = Some(now);
            } else {
                sub.failure_count += 1;
                sub.last_failure_at = Some(now);
            }
            sub.updated_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl crate::store::DeliveryStore for MemoryStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn open_delivery(&self, input: &NewDelivery) -> Result<WebhookDelivery, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        if !tables.subscriptions.contains_key(&input.subscription_id) {
            return Err(sqlx::Error::RowNotFound);
        }
        let now = Utc::now();
        let delivery = WebhookDelivery {
            id: input.id,
            tenant_id: input.tenant_id,
            subscription_id: input.subscription_id,
            event_type: input.event_type.clone(),
            event_id: input.event_id.clone(),
            event_data: input.event_data.clone(),
            status: DeliveryStatus::Pending,
            response_code: None,
            response_body: None,
            error_message: None,
            attempt_number: 1,
            next_retry_at: None,
            duration_ms: None,
            claimed_at: Some(claim_stamp(input.claimed_at)),
            created_at: now,
            updated_at: now,
        };
        tables.deliveries.insert(delivery.id, delivery.clone());
        Ok(delivery)
    }

    async fn record_attempt(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        attempt: &AttemptRecord,
    ) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let Some(delivery) = tables
            .deliveries
            .get_mut(&delivery_id)
            .filter(|d| d.tenant_id == tenant_id)
        else {
            return Err(sqlx::Error::RowNotFound);
        };
        if delivery.claimed_at != attempt.claimed_at {
            return Ok(false);
        }

        delivery.status = attempt.status;
        delivery.response_code = attempt.response_code;
        delivery.response_body = attempt.response_body.clone();
        delivery.error_message = attempt.error_message.clone();
        delivery.attempt_number = attempt.attempt_number;
        delivery.next_retry_at = attempt.next_retry_at;
        delivery.duration_ms = Some(attempt.duration_ms);
        delivery.claimed_at = None;
        delivery.updated_at = Utc::now();

        tables.attempts.push(DeliveryAttempt {
            id: uuid::Uuid::now_v7(),
            delivery_id,
            tenant_id,
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            response_code: attempt.response_code,
            response_body: attempt.response_body.clone(),
            error_message: attempt.error_message.clone(),
            duration_ms: attempt.duration_ms,
            attempted_at: attempt.attempted_at,
        });
        Ok(true)
    }

    async fn abandon_delivery(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        claimed_at: Option<Timestamp>,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let Some(delivery) = tables
            .deliveries
            .get_mut(&delivery_id)
            .filter(|d| d.tenant_id == tenant_id && d.claimed_at == claimed_at)
        else {
            return Ok(false);
        };
        delivery.status = DeliveryStatus::Failed;
        delivery.error_message = Some(error_message.to_string());
        delivery.next_retry_at = None;
        delivery.claimed_at = None;
        delivery.updated_at = Utc::now();
        Ok(true)
    }

    async fn claim_due_retries(
        &self,
        due_by: Timestamp,
        claimed_at: Timestamp,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let mut due: Vec<(Timestamp, DbId)> = tables
            .deliveries
            .values()
            .filter(|d| d.status == DeliveryStatus::Retrying)
            .filter_map(|d| d.next_retry_at.filter(|at| *at <= due_by).map(|at| (at, d.id)))
            .collect();
        due.sort();
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(delivery) = tables.deliveries.get_mut(&id) {
                delivery.status = DeliveryStatus::Pending;
                delivery.next_retry_at = None;
                delivery.claimed_at = Some(claim_stamp(claimed_at));
                delivery.updated_at = Utc::now();
                claimed.push(delivery.clone());
            }
        }
        Ok(claimed)
    }

    async fn claim_for_retry(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        now: Timestamp,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let Some(delivery) = tables.deliveries.get_mut(&delivery_id).filter(|d| {
            d.tenant_id == tenant_id
                && !matches!(d.status, DeliveryStatus::Success | DeliveryStatus::Pending)
        }) else {
            return Ok(None);
        };

        delivery.status = DeliveryStatus::Pending;
        delivery.next_retry_at = None;
        delivery.claimed_at = Some(claim_stamp(now));
        delivery.updated_at = Utc::now();
        Ok(Some(delivery.clone()))
    }

    async fn release_stale_claims(
        &self,
        stale_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let mut released = 0;
        for delivery in tables.deliveries.values_mut() {
            let stale = delivery.status == DeliveryStatus::Pending
                && delivery.claimed_at.is_some_and(|at| at < stale_before);
            if stale {
                delivery.status = DeliveryStatus::Retrying;
                delivery.next_retry_at = Some(now);
                delivery.claimed_at = None;
                delivery.updated_at = Utc::now();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn find_delivery(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .deliveries
            .get(&id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_deliveries(
        &self,
        tenant_id: TenantId,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<WebhookDelivery> = tables
            .deliveries
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter(|d| filter.subscription_id.map_or(true, |id| d.subscription_id == id))
            .filter(|d| filter.status.map_or(true, |status| d.status == status))
            .filter(|d| {
                filter
                    .event_type
                    .as_deref()
                    .map_or(true, |event_type| d.event_type == event_type)
            })
            .filter(|d| {
                filter
                    .event_id
                    .as_deref()
                    .map_or(true, |event_id| d.event_id == event_id)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn list_attempts(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
    ) -> Result<Vec<DeliveryAttempt>, sqlx::Error> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<DeliveryAttempt> = tables
            .attempts
            .iter()
            .filter(|a| a.delivery_id == delivery_id && a.tenant_id == tenant_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.attempt_number);
        Ok(rows)
    }
}
