//! Repository for the `webhook_subscriptions` table.

use chrono::Utc;
use hookline_core::types::{DbId, TenantId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::subscription::{
    metadata_keys, NewSubscription, UpdateWebhookSubscription, WebhookSubscription,
};

/// Column list for webhook_subscriptions queries.
const COLUMNS: &str = "\
    id, tenant_id, url, events, secret, headers, is_active, retry_enabled, \
    max_retries, timeout_secs, success_count, failure_count, \
    last_triggered_at, last_success_at, last_failure_at, metadata, \
    created_at, updated_at";

/// Provides CRUD, matching and bookkeeping for webhook subscriptions.
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    /// Insert a new active subscription, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &NewSubscription,
    ) -> Result<WebhookSubscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_subscriptions \
                (id, tenant_id, url, events, secret, headers, retry_enabled, max_retries, timeout_secs) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(input.id)
            .bind(input.tenant_id)
            .bind(&input.url)
            .bind(&input.events)
            .bind(&input.secret)
            .bind(Json(&input.headers))
            .bind(input.retry_enabled)
            .bind(input.max_retries)
            .bind(input.timeout_secs)
            .fetch_one(pool)
            .await
    }

    /// Find a subscription by id within a tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM webhook_subscriptions WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// List a tenant's subscriptions, newest first.
    pub async fn list(
        pool: &PgPool,
        tenant_id: TenantId,
        is_active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhook_subscriptions \
             WHERE tenant_id = $1 AND ($2::BOOLEAN IS NULL OR is_active = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(tenant_id)
            .bind(is_active)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Active subscriptions of a tenant that subscribe to `event_type`.
    pub async fn list_matching(
        pool: &PgPool,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhook_subscriptions \
             WHERE tenant_id = $1 AND is_active AND $2 = ANY(events) \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(tenant_id)
            .bind(event_type)
            .fetch_all(pool)
            .await
    }

    /// Apply a partial update. Inputs must already be validated.
    ///
    /// Setting `is_active = true` also clears the recorded disablement.
    pub async fn update(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
        input: &UpdateWebhookSubscription,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_subscriptions SET \
                 url = COALESCE($3, url), \
                 events = COALESCE($4, events), \
                 headers = COALESCE($5, headers), \
                 is_active = COALESCE($6, is_active), \
                 retry_enabled = COALESCE($7, retry_enabled), \
                 max_retries = COALESCE($8, max_retries), \
                 timeout_secs = COALESCE($9, timeout_secs), \
                 metadata = CASE WHEN $6 IS TRUE \
                     THEN metadata - '{disabled_reason}' - '{disabled_at}' \
                     ELSE metadata END \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {COLUMNS}",
            disabled_reason = metadata_keys::DISABLED_REASON,
            disabled_at = metadata_keys::DISABLED_AT,
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(input.url.as_deref())
            .bind(input.events.as_ref())
            .bind(input.headers.as_ref().map(Json))
            .bind(input.is_active)
            .bind(input.retry_enabled)
            .bind(input.max_retries)
            .bind(input.timeout)
            .fetch_optional(pool)
            .await
    }

    /// Hard delete. Deliveries and their attempts cascade.
    pub async fn delete(pool: &PgPool, tenant_id: TenantId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the sealed secret and record rotation metadata.
    pub async fn rotate_secret(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
        sealed_secret: &str,
        previous_hint: &str,
        rotated_at: Timestamp,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_subscriptions SET \
                 secret = $3, \
                 metadata = metadata || jsonb_build_object( \
                     '{rotated_at_key}', to_jsonb($4::TIMESTAMPTZ), \
                     '{count_key}', COALESCE((metadata->>'{count_key}')::BIGINT, 0) + 1, \
                     '{hint_key}', $5::TEXT) \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {COLUMNS}",
            rotated_at_key = metadata_keys::SECRET_ROTATED_AT,
            count_key = metadata_keys::SECRET_ROTATION_COUNT,
            hint_key = metadata_keys::PREVIOUS_SECRET_HINT,
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(sealed_secret)
            .bind(rotated_at)
            .bind(previous_hint)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate and record why. Returns `false` if already inactive or missing.
    pub async fn deactivate(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
        reason: &str,
        disabled_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_subscriptions SET \
                 is_active = FALSE, \
                 metadata = metadata || jsonb_build_object( \
                     '{reason_key}', $3::TEXT, \
                     '{at_key}', to_jsonb($4::TIMESTAMPTZ)) \
             WHERE id = $1 AND tenant_id = $2 AND is_active",
            reason_key = metadata_keys::DISABLED_REASON,
            at_key = metadata_keys::DISABLED_AT,
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(reason)
            .bind(disabled_at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump success/failure statistics for one attempt.
    pub async fn record_outcome(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
        success: bool,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE webhook_subscriptions SET \
                 success_count = success_count + CASE WHEN $3 THEN 1 ELSE 0 END, \
                 failure_count = failure_count + CASE WHEN $3 THEN 0 ELSE 1 END, \
                 last_triggered_at = $4, \
                 last_success_at = CASE WHEN $3 THEN $4 ELSE last_success_at END, \
                 last_failure_at = CASE WHEN $3 THEN last_failure_at ELSE $4 END \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(success)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }
}
