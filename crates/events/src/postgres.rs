use async_trait::async_trait;
use hookline_core::types::{DbId, TenantId, Timestamp};
use hookline_db::models::delivery::{
    AttemptRecord, DeliveryAttempt, DeliveryFilter, NewDelivery, WebhookDelivery,
};
use hookline_db::models::subscription::{
    NewSubscription, UpdateWebhookSubscription, WebhookSubscription,
};
use hookline_db::repositories::{DeliveryRepo, SubscriptionRepo};
use hookline_db::DbPool;

use crate::store::{DeliveryStore, SubscriptionStore};

/// Postgres-backed store delegating to the `hookline-db` repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn insert_subscription(
        &self,
        input: &NewSubscription,
    ) -> Result<WebhookSubscription, sqlx::Error> {
        SubscriptionRepo::create(&self.pool, input).await
    }

    async fn find_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        SubscriptionRepo::find_by_id(&self.pool, tenant_id, id).await
    }

    async fn list_subscriptions(
        &self,
        tenant_id: TenantId,
        is_active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        SubscriptionRepo::list(&self.pool, tenant_id, is_active, limit, offset).await
    }

    async fn matching_subscriptions(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        SubscriptionRepo::list_matching(&self.pool, tenant_id, event_type).await
    }

    async fn update_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
        input: &UpdateWebhookSubscription,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        SubscriptionRepo::update(&self.pool, tenant_id, id, input).await
    }

    async fn delete_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        SubscriptionRepo::delete(&self.pool, tenant_id, id).await
    }

    async fn rotate_subscription_secret(
        &self,
        tenant_id: TenantId,
        id: DbId,
        sealed_secret: &str,
        previous_hint: &str,
        rotated_at: Timestamp,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        SubscriptionRepo::rotate_secret(
            &self.pool,
            tenant_id,
            id,
            sealed_secret,
            previous_hint,
            rotated_at,
        )
        .await
    }

    async fn deactivate_subscription(
        &self,
        tenant_id: TenantId,
        id: DbId,
        reason: &str,
        disabled_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        SubscriptionRepo::deactivate(&self.pool, tenant_id, id, reason, disabled_at).await
    }

    async fn record_subscription_outcome(
        &self,
        tenant_id: TenantId,
        id: DbId,
        success: bool,
    ) -> Result<(), sqlx::Error> {
        SubscriptionRepo::record_outcome(&self.pool, tenant_id, id, success).await
    }
}

#[async_trait]
impl DeliveryStore for PgStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        hookline_db::health_check(&self.pool).await
    }

    async fn open_delivery(&self, input: &NewDelivery) -> Result<WebhookDelivery, sqlx::Error> {
        DeliveryRepo::open(&self.pool, input).await
    }

    async fn record_attempt(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        attempt: &AttemptRecord,
    ) -> Result<bool, sqlx::Error> {
        DeliveryRepo::record_attempt(&self.pool, tenant_id, delivery_id, attempt).await
    }

    async fn abandon_delivery(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        claimed_at: Option<Timestamp>,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        DeliveryRepo::abandon(&self.pool, tenant_id, delivery_id, claimed_at, error_message).await
    }

    async fn claim_due_retries(
        &self,
        due_by: Timestamp,
        claimed_at: Timestamp,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        DeliveryRepo::claim_due(&self.pool, due_by, claimed_at, limit).await
    }

    async fn claim_for_retry(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
        now: Timestamp,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        DeliveryRepo::claim_for_retry(&self.pool, tenant_id, delivery_id, now).await
    }

    async fn release_stale_claims(
        &self,
        stale_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        DeliveryRepo::release_stale_claims(&self.pool, stale_before, now).await
    }

    async fn find_delivery(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        DeliveryRepo::find_by_id(&self.pool, tenant_id, id).await
    }

    async fn list_deliveries(
        &self,
        tenant_id: TenantId,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        DeliveryRepo::list(&self.pool, tenant_id, filter).await
    }

    async fn list_attempts(
        &self,
        tenant_id: TenantId,
        delivery_id: DbId,
    ) -> Result<Vec<DeliveryAttempt>, sqlx::Error> {
        DeliveryRepo::list_attempts(&self.pool, tenant_id, delivery_id).await
    }
}
