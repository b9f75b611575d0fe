//! Repository for `webhook_deliveries` and `webhook_delivery_attempts`.
//!
//! `webhook_deliveries` holds the latest state of each logical delivery;
//! every HTTP attempt also appends an immutable row to
//! `webhook_delivery_attempts`.

use hookline_core::types::{DbId, TenantId, Timestamp};
use sqlx::PgPool;

use crate::models::delivery::{
    AttemptRecord, DeliveryAttempt, DeliveryFilter, NewDelivery, WebhookDelivery,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const DELIVERY_COLUMNS: &str = "\
    id, tenant_id, subscription_id, event_type, event_id, event_data, status, \
    response_code, response_body, error_message, attempt_number, next_retry_at, \
    duration_ms, claimed_at, created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "\
    id, delivery_id, tenant_id, attempt_number, status, response_code, \
    response_body, error_message, duration_ms, attempted_at";

/// Provides delivery logging, listing, and retry claims.
pub struct DeliveryRepo;

impl DeliveryRepo {
    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Open a delivery as `PENDING`, claimed for its first attempt.
    pub async fn open(pool: &PgPool, input: &NewDelivery) -> Result<WebhookDelivery, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_deliveries \
                (id, tenant_id, subscription_id, event_type, event_id, event_data, \
                 status, attempt_number, claimed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', 1, $7) \
             RETURNING {DELIVERY_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(input.id)
            .bind(input.tenant_id)
            .bind(input.subscription_id)
            .bind(&input.event_type)
            .bind(&input.event_id)
            .bind(&input.event_data)
            .bind(input.claimed_at)
            .fetch_one(pool)
            .await
    }

    /// Store the outcome of one attempt: update the latest-status row and
    /// append to the attempt history in a single transaction.
    ///
    /// Returns `false`, writing nothing, when the delivery no longer carries
    /// the claim the attempt ran under.
    pub async fn record_attempt(
        pool: &PgPool,
        tenant_id: TenantId,
        delivery_id: DbId,
        attempt: &AttemptRecord,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE webhook_deliveries SET \
                 status = $3, response_code = $4, response_body = $5, error_message = $6, \
                 attempt_number = $7, next_retry_at = $8, duration_ms = $9, claimed_at = NULL \
             WHERE id = $1 AND tenant_id = $2 AND claimed_at IS NOT DISTINCT FROM $10",
        )
        .bind(delivery_id)
        .bind(tenant_id)
        .bind(attempt.status.as_str())
        .bind(attempt.response_code)
        .bind(attempt.response_body.as_deref())
        .bind(attempt.error_message.as_deref())
        .bind(attempt.attempt_number)
        .bind(attempt.next_retry_at)
        .bind(attempt.duration_ms)
        .bind(attempt.claimed_at)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO webhook_delivery_attempts \
                (id, delivery_id, tenant_id, attempt_number, status, response_code, \
                 response_body, error_message, duration_ms, attempted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(uuid::Uuid::now_v7())
        .bind(delivery_id)
        .bind(tenant_id)
        .bind(attempt.attempt_number)
        .bind(attempt.status.as_str())
        .bind(attempt.response_code)
        .bind(attempt.response_body.as_deref())
        .bind(attempt.error_message.as_deref())
        .bind(attempt.duration_ms)
        .bind(attempt.attempted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Mark a claimed delivery `FAILED` without attempting it. Returns
    /// `false` when the claim has moved on.
    pub async fn abandon(
        pool: &PgPool,
        tenant_id: TenantId,
        delivery_id: DbId,
        claimed_at: Option<Timestamp>,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_deliveries SET \
                 status = 'FAILED', error_message = $4, next_retry_at = NULL, claimed_at = NULL \
             WHERE id = $1 AND tenant_id = $2 AND claimed_at IS NOT DISTINCT FROM $3",
        )
        .bind(delivery_id)
        .bind(tenant_id)
        .bind(claimed_at)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// Atomically claim up to `limit` retries due by `due_by` across all
    /// tenants.
    ///
    /// Claimed rows move `RETRYING -> PENDING` stamped with `claimed_at`;
    /// concurrent sweeps skip rows another sweep has locked.
    pub async fn claim_due(
        pool: &PgPool,
        due_by: Timestamp,
        claimed_at: Timestamp,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_deliveries SET \
                 status = 'PENDING', next_retry_at = NULL, claimed_at = $3 \
             WHERE id IN ( \
                 SELECT id FROM webhook_deliveries \
                 WHERE status = 'RETRYING' AND next_retry_at <= $1 \
                 ORDER BY next_retry_at ASC \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED) \
             RETURNING {DELIVERY_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(due_by)
            .bind(limit)
            .bind(claimed_at)
            .fetch_all(pool)
            .await
    }

    /// Claim one delivery for a manual retry. Returns `None` when it is
    /// missing, already `SUCCESS`, or currently in flight.
    pub async fn claim_for_retry(
        pool: &PgPool,
        tenant_id: TenantId,
        delivery_id: DbId,
        now: Timestamp,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_deliveries SET \
                 status = 'PENDING', next_retry_at = NULL, claimed_at = $3 \
             WHERE id = $1 AND tenant_id = $2 AND status NOT IN ('SUCCESS', 'PENDING') \
             RETURNING {DELIVERY_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(delivery_id)
            .bind(tenant_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Return claims older than `stale_before` to `RETRYING`, due at `now`.
    pub async fn release_stale_claims(
        pool: &PgPool,
        stale_before: Timestamp,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_deliveries SET \
                 status = 'RETRYING', next_retry_at = $2, claimed_at = NULL \
             WHERE status = 'PENDING' AND claimed_at < $1",
        )
        .bind(stale_before)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        let query =
            format!("SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// List a tenant's deliveries, newest first, with optional filters.
    pub async fn list(
        pool: &PgPool,
        tenant_id: TenantId,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let mut conditions: Vec<String> = vec!["tenant_id = $1".to_string()];
        let mut param_idx: usize = 1;

        if filter.subscription_id.is_some() {
            param_idx += 1;
            conditions.push(format!("subscription_id = ${param_idx}"));
        }
        if filter.status.is_some() {
            param_idx += 1;
            conditions.push(format!("status = ${param_idx}"));
        }
        if filter.event_type.is_some() {
            param_idx += 1;
            conditions.push(format!("event_type = ${param_idx}"));
        }
        if filter.event_id.is_some() {
            param_idx += 1;
            conditions.push(format!("event_id = ${param_idx}"));
        }

        let limit_idx = param_idx + 1;
        let offset_idx = param_idx + 2;

        let query = format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries \
             WHERE {} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${limit_idx} OFFSET ${offset_idx}",
            conditions.join(" AND ")
        );

        let mut q = sqlx::query_as::<_, WebhookDelivery>(&query).bind(tenant_id);
        if let Some(subscription_id) = filter.subscription_id {
            q = q.bind(subscription_id);
        }
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(ref event_type) = filter.event_type {
            q = q.bind(event_type);
        }
        if let Some(ref event_id) = filter.event_id {
            q = q.bind(event_id);
        }
        q.bind(filter.limit).bind(filter.offset).fetch_all(pool).await
    }

    /// Attempt history of one delivery, oldest first.
    pub async fn list_attempts(
        pool: &PgPool,
        tenant_id: TenantId,
        delivery_id: DbId,
    ) -> Result<Vec<DeliveryAttempt>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM webhook_delivery_attempts \
             WHERE delivery_id = $1 AND tenant_id = $2 \
             ORDER BY attempt_number ASC"
        );
        sqlx::query_as::<_, DeliveryAttempt>(&query)
            .bind(delivery_id)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
