use std::sync::Arc;
use std::time::Duration;

use hookline_core::error::CoreError;
use hookline_core::secrets::{AesGcmCipher, PlaintextCipher, SecretCipher};
use hookline_core::validation::MAX_TIMEOUT_SECS;

/// Tuning for delivery, fan-out and the retry sweep.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Upper bound on concurrent outbound requests per publish or sweep.
    pub max_concurrency: usize,
    /// Reject unregistered event types instead of warning.
    pub strict_event_types: bool,
    /// Deliveries claimed per sweep.
    pub retry_batch_size: i64,
    /// Time between sweeps.
    pub retry_interval: Duration,
    /// Claims older than this are considered abandoned by a crashed worker.
    /// Must exceed the longest subscription timeout, see
    /// [`validate_claim_timeout`].
    pub claim_timeout: Duration,
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            strict_event_types: false,
            retry_batch_size: 100,
            retry_interval: Duration::from_secs(30),
            claim_timeout: Duration::from_secs(600),
            user_agent: concat!("hookline-webhooks/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DeliveryConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                     |
    /// |--------------------------------|-----------------------------|
    /// | `WEBHOOK_MAX_CONCURRENCY`      | `16`                        |
    /// | `WEBHOOK_STRICT_EVENT_TYPES`   | `false`                     |
    /// | `WEBHOOK_RETRY_BATCH_SIZE`     | `100`                       |
    /// | `WEBHOOK_RETRY_INTERVAL_SECS`  | `30`                        |
    /// | `WEBHOOK_CLAIM_TIMEOUT_SECS`   | `600`                       |
    /// | `WEBHOOK_USER_AGENT`           | `hookline-webhooks/<version>` |
    ///
    /// # Panics
    ///
    /// Panics on unparsable values, or if the claim timeout does not exceed
    /// the maximum subscription timeout.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_concurrency: usize = std::env::var("WEBHOOK_MAX_CONCURRENCY")
            .map(|v| {
                v.parse()
                    .expect("WEBHOOK_MAX_CONCURRENCY must be a valid usize")
            })
            .unwrap_or(defaults.max_concurrency);

        let strict_event_types: bool = std::env::var("WEBHOOK_STRICT_EVENT_TYPES")
            .map(|v| {
                v.parse()
                    .expect("WEBHOOK_STRICT_EVENT_TYPES must be true or false")
            })
            .unwrap_or(defaults.strict_event_types);

        let retry_batch_size: i64 = std::env::var("WEBHOOK_RETRY_BATCH_SIZE")
            .map(|v| {
                v.parse()
                    .expect("WEBHOOK_RETRY_BATCH_SIZE must be a valid i64")
            })
            .unwrap_or(defaults.retry_batch_size);

        let retry_interval = std::env::var("WEBHOOK_RETRY_INTERVAL_SECS")
            .map(|v| {
                Duration::from_secs(
                    v.parse()
                        .expect("WEBHOOK_RETRY_INTERVAL_SECS must be a valid u64"),
                )
            })
            .unwrap_or(defaults.retry_interval);

        let claim_timeout = std::env::var("WEBHOOK_CLAIM_TIMEOUT_SECS")
            .map(|v| {
                Duration::from_secs(
                    v.parse()
                        .expect("WEBHOOK_CLAIM_TIMEOUT_SECS must be a valid u64"),
                )
            })
            .unwrap_or(defaults.claim_timeout);
        validate_claim_timeout(claim_timeout)
            .expect("WEBHOOK_CLAIM_TIMEOUT_SECS is too short");

        let user_agent = std::env::var("WEBHOOK_USER_AGENT").unwrap_or(defaults.user_agent);

        Self {
            max_concurrency: max_concurrency.max(1),
            strict_event_types,
            retry_batch_size: retry_batch_size.max(1),
            retry_interval,
            claim_timeout,
            user_agent,
        }
    }
}

/// A claim must outlive the slowest attempt it covers. A shorter timeout
/// lets the stale-claim release hand an in-flight delivery to a second
/// sweep.
pub fn validate_claim_timeout(claim_timeout: Duration) -> Result<(), CoreError> {
    let longest_attempt = Duration::from_secs(MAX_TIMEOUT_SECS as u64);
    if claim_timeout <= longest_attempt {
        return Err(CoreError::Validation(format!(
            "claim timeout must exceed the {MAX_TIMEOUT_SECS}s maximum subscription timeout, got {}s",
            claim_timeout.as_secs()
        )));
    }
    Ok(())
}

/// Pick the at-rest sealer for subscription secrets.
///
/// | Env Var              | Default                          |
/// |----------------------|----------------------------------|
/// | `WEBHOOK_SECRET_KEY` | unset: secrets stored as plaintext |
///
/// The key is a base64-encoded 32-byte AES-256 key.
///
/// # Panics
///
/// Panics if `WEBHOOK_SECRET_KEY` is set but is not a valid key.
pub fn secret_cipher_from_env() -> Arc<dyn SecretCipher> {
    match std::env::var("WEBHOOK_SECRET_KEY") {
        Ok(key) => {
            let cipher = AesGcmCipher::from_base64(key.trim())
                .expect("WEBHOOK_SECRET_KEY must be a base64-encoded 32-byte key");
            tracing::info!("Subscription secrets sealed with AES-256-GCM");
            Arc::new(cipher)
        }
        Err(_) => {
            tracing::warn!("WEBHOOK_SECRET_KEY not set, subscription secrets stored in plaintext");
            Arc::new(PlaintextCipher)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DeliveryConfig::default();
        assert_eq!(config.max_concurrency, 16);
        assert!(!config.strict_event_types);
        assert_eq!(config.retry_batch_size, 100);
        assert_eq!(config.retry_interval, Duration::from_secs(30));
        assert_eq!(config.claim_timeout, Duration::from_secs(600));
        assert!(config.user_agent.starts_with("hookline-webhooks/"));
        assert!(validate_claim_timeout(config.claim_timeout).is_ok());
    }

    #[test]
    fn claim_timeout_must_outlive_the_slowest_attempt() {
        assert!(validate_claim_timeout(Duration::from_secs(301)).is_ok());
        assert!(validate_claim_timeout(Duration::from_secs(300)).is_err());
        assert!(validate_claim_timeout(Duration::from_secs(3)).is_err());
    }
}
