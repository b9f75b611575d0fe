//! Persistence seams for the webhook services.
//!
//! [`PgStore`](crate::PgStore) backs these with Postgres and
//! [`MemoryStore`](crate::MemoryStore) keeps everything in process. Both
//! honour the same contract: every call is tenant-scoped except the retry sweep, deleting
//! a subscription removes its deliveries, and claims are atomic.

use async_trait::async_trait;
use hookline_core::types::{DbId, TenantId, Timestamp};
use hookline_db::models::delivery::{
    AttemptRecord, DeliveryAttempt, DeliveryFilter, NewDelivery, WebhookDelivery,
};
use hookline_db::models::subscription::{
    NewSubscription, UpdateWebhookSubscription, WebhookSubscription,
};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert_subscription(
        &self,
        input: &NewSubscription,
    ) -> Result<WebhookSubscription, sqlx::Error>;

    async fn find_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error>;

    /// Newest first.
    async fn list_subscriptions(
        &self,
        tenant_id: TenantId,
        is_active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error>;

    /// Active subscriptions of the tenant that list `event_type`.
    async fn matching_subscriptions(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error>;

    /// Partial update of validated fields. Re-activation clears the
    /// recorded disablement.
    async fn update_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
        input: &UpdateWebhookSubscription,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error>;

    async fn delete_subscription(&self, tenant_id: TenantId, id: DbId)
        -> Result<bool, sqlx::Error>;

    async fn rotate_subscription_secret(
        &self,
        tenant_id: TenantId,
        id: DbId,
        sealed_secret: &str,
        previous_hint: &str,
        rotated_at: Timestamp,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error>;

    /// Returns `false` when the subscription was already inactive.
    async fn deactivate_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
        reason: &str,
        disabled_at: Timestamp,
    ) -> Result<bool, sqlx::Error>;

    async fn record_subscription_outcome(
        &self,
        tenant_id: TenantId,
        id: DbId,
        success: bool,
    ) -> Result<(), sqlx::Error>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Confirm the backing store is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;

    async fn open_delivery(&self, input: &NewDelivery) -> Result<WebhookDelivery, sqlx::Error>;

    /// Persist an attempt made under `attempt.claimed_at`. Returns `false`,
    /// writing nothing, if the delivery has been claimed by someone else
    /// since.
    async fn record_attempt(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        attempt: &AttemptRecord,
    ) -> Result<bool, sqlx::Error>;

    /// Mark a claimed delivery `FAILED` unsent. Same claim check as
    /// [`record_attempt`](Self::record_attempt).
    async fn abandon_delivery(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        claimed_at: Option<Timestamp>,
        error_message: &str,
    ) -> Result<bool, sqlx::Error>;

    /// Claim retries due by `due_by` across all tenants
    /// (`RETRYING -> PENDING`), stamping them with `claimed_at`.
    async fn claim_due_retries(
        &self,
        due_by: Timestamp,
        claimed_at: Timestamp,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error>;

    /// Claim one delivery for a manual retry unless it is `SUCCESS` or in flight.
    async fn claim_for_retry(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        now: Timestamp,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error>;

    async fn release_stale_claims(
        &self,
        stale_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error>;

    async fn find_delivery(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error>;

    async fn list_deliveries(
        &self,
        tenant_id: TenantId,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error>;

    /// Oldest first.
    async fn list_attempts(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
    ) -> Result<Vec<DeliveryAttempt>, sqlx::Error>;
}

/// Everything the webhook services need from persistence.
pub trait WebhookStore: SubscriptionStore + DeliveryStore {}

impl<T: SubscriptionStore + DeliveryStore> WebhookStore for T {}
