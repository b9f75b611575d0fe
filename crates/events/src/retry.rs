//! Background sweep resuming due retries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use hookline_core::delivery::{claim_stamp, INACTIVE_SUBSCRIPTION_MESSAGE};
use hookline_core::types::Timestamp;
use hookline_db::models::delivery::WebhookDelivery;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::DeliveryConfig;
use crate::delivery::DeliveryEngine;
use crate::error::WebhookError;
use crate::store::WebhookStore;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySweep {
    /// Stale claims returned to `RETRYING`.
    pub released: u64,
    /// Due retries claimed by this sweep.
    pub claimed: usize,
    /// Claimed retries that were sent.
    pub attempted: usize,
    /// Claimed retries marked `FAILED` because their subscription is inactive.
    pub abandoned: usize,
}

enum Resumed {
    Sent,
    Abandoned,
    /// Left claimed; the stale-claim release hands it to a later sweep.
    Skipped,
}

// ---------------------------------------------------------------------------
// RetryScheduler
// ---------------------------------------------------------------------------

/// Finds deliveries whose retry is due and hands them back to the
/// [`DeliveryEngine`].
///
/// Work is claimed atomically, so any number of schedulers may sweep the
/// same store without sending a retry twice.
#[derive(Clone)]
pub struct RetryScheduler {
    engine: DeliveryEngine,
    store: Arc<dyn WebhookStore>,
    semaphore: Arc<Semaphore>,
    batch_size: i64,
    interval: Duration,
    claim_timeout: chrono::Duration,
}

impl RetryScheduler {
    pub fn new(engine: DeliveryEngine, store: Arc<dyn WebhookStore>, config: &DeliveryConfig) -> Self {
        Self {
            engine,
            store,
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            batch_size: config.retry_batch_size,
            interval: config.retry_interval,
            claim_timeout: chrono::Duration::from_std(config.claim_timeout)
                .unwrap_or_else(|_| chrono::Duration::minutes(10)),
        }
    }

    /// Run the sweep loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retry scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.process_pending_retries(self.batch_size).await {
                        tracing::error!(error = %e, "Failed to process pending retries");
                    }
                }
            }
        }
    }

    /// Resume up to `limit` retries that are due now.
    pub async fn process_pending_retries(&self, limit: i64) -> Result<RetrySweep, WebhookError> {
        self.process_due(Utc::now(), limit).await
    }

    /// Resume up to `limit` retries due at `now`.
    ///
    /// A concurrency permit is taken before each claim, so a claimed
    /// delivery is sent right away and its claim age only covers the
    /// attempt itself. Claims are stamped on the sweep's clock, which
    /// starts at `now` and advances in real time.
    ///
    /// Each delivery's subscription is loaded fresh; if it has been disabled
    /// or removed since the last attempt the delivery is marked `FAILED`
    /// instead of sent.
    pub async fn process_due(&self, now: Timestamp, limit: i64) -> Result<RetrySweep, WebhookError> {
        let started = Instant::now();
        let mut sweep = RetrySweep {
            released: self
                .store
                .release_stale_claims(now - self.claim_timeout, now)
                .await?,
            ..Default::default()
        };
        if sweep.released > 0 {
            tracing::warn!(released = sweep.released, "Released stale delivery claims");
        }

        let limit = usize::try_from(limit).unwrap_or(0);
        let mut tasks = JoinSet::new();
        let mut claim_error = None;

        while sweep.claimed < limit {
            let Some(permits) = self.reserve_permits(limit - sweep.claimed).await else {
                break;
            };
            let wanted = permits.len();
            let claimed = match self
                .store
                .claim_due_retries(now, sweep_clock(now, started), wanted as i64)
                .await
            {
                Ok(claimed) => claimed,
                Err(e) => {
                    claim_error = Some(e);
                    break;
                }
            };

            let exhausted = claimed.len() < wanted;
            sweep.claimed += claimed.len();
            for (delivery, permit) in claimed.into_iter().zip(permits) {
                let scheduler = self.clone();
                tasks.spawn(async move { scheduler.resume_one(delivery, permit).await });
            }
            if exhausted {
                break;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Resumed::Sent) => sweep.attempted += 1,
                Ok(Resumed::Abandoned) => sweep.abandoned += 1,
                Ok(Resumed::Skipped) => {}
                Err(e) => tracing::error!(error = %e, "Retry task panicked"),
            }
        }

        if sweep.claimed > 0 {
            tracing::info!(
                claimed = sweep.claimed,
                attempted = sweep.attempted,
                abandoned = sweep.abandoned,
                "Processed pending retries"
            );
        }
        match claim_error {
            Some(e) => Err(e.into()),
            None => Ok(sweep),
        }
    }

    /// Wait for one free permit, then take up to `wanted` without waiting.
    async fn reserve_permits(&self, wanted: usize) -> Option<Vec<OwnedSemaphorePermit>> {
        let first = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        let mut permits = vec![first];
        while permits.len() < wanted {
            match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(permit) => permits.push(permit),
                Err(_) => break,
            }
        }
        Some(permits)
    }

    async fn resume_one(&self, delivery: WebhookDelivery, _permit: OwnedSemaphorePermit) -> Resumed {
        let subscription = match self
            .store
            .find_subscription(delivery.tenant_id, delivery.subscription_id)
            .await
        {
            Ok(Some(sub)) if sub.is_active => sub,
            Ok(_) => {
                tracing::info!(
                    delivery_id = %delivery.id,
                    subscription_id = %delivery.subscription_id,
                    "Subscription no longer active, abandoning retry"
                );
                self.abandon(&delivery).await;
                return Resumed::Abandoned;
            }
            Err(e) => {
                tracing::error!(
                    delivery_id = %delivery.id,
                    error = %e,
                    "Failed to load subscription for retry"
                );
                return Resumed::Skipped;
            }
        };

        self.engine.resume(&delivery, &subscription).await;
        Resumed::Sent
    }

    async fn abandon(&self, delivery: &WebhookDelivery) {
        match self
            .store
            .abandon_delivery(
                delivery.tenant_id,
                delivery.id,
                delivery.claimed_at,
                INACTIVE_SUBSCRIPTION_MESSAGE,
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                delivery_id = %delivery.id,
                "Delivery was claimed again before it could be abandoned"
            ),
            Err(e) => {
                tracing::error!(delivery_id = %delivery.id, error = %e, "Failed to abandon delivery")
            }
        }
    }
}

/// `now` advanced by the real time elapsed since `started`.
fn sweep_clock(now: Timestamp, started: Instant) -> Timestamp {
    let elapsed = chrono::Duration::from_std(started.elapsed()).unwrap_or_default();
    claim_stamp(now + elapsed)
}
