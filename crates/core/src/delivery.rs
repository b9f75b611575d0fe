//! Delivery status, response classification, and the retry state machine.
//!
//! ```text
//! PENDING  ──► SUCCESS | FAILED | RETRYING | DISABLED
//! RETRYING ──► SUCCESS | FAILED | RETRYING | DISABLED
//! ```
//!
//! `SUCCESS`, `FAILED` and `DISABLED` are terminal. `next_retry_at` is set
//! exactly when the status is `RETRYING`.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fixed retry delays indexed by `min(attempt_number - 1, 2)`.
pub const BACKOFF_LADDER_SECS: [i64; 3] = [5 * 60, 60 * 60, 6 * 60 * 60];

/// Maximum stored size of a subscriber response body, in bytes.
pub const RESPONSE_BODY_CAP: usize = 1000;

/// Error message recorded when a subscriber answers `410 Gone`.
pub const GONE_ERROR_MESSAGE: &str = "endpoint returned 410";

/// Reason recorded on the subscription when a `410 Gone` disables it.
pub const GONE_DISABLE_REASON: &str = "Endpoint returned 410 Gone";

/// Error message recorded when a retry finds its subscription inactive.
pub const INACTIVE_SUBSCRIPTION_MESSAGE: &str = "subscription no longer active";

// ---------------------------------------------------------------------------
// DeliveryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    Retrying,
    Disabled,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 5] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Success,
        DeliveryStatus::Failed,
        DeliveryStatus::Retrying,
        DeliveryStatus::Disabled,
    ];

    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Success => "SUCCESS",
            DeliveryStatus::Failed => "FAILED",
            DeliveryStatus::Retrying => "RETRYING",
            DeliveryStatus::Disabled => "DISABLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Success | DeliveryStatus::Failed | DeliveryStatus::Disabled
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown delivery status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeliveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for DeliveryStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

/// How a single attempt resolved, from the retry policy's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// Any 2xx status.
    Delivered,
    /// `410 Gone`: the subscriber asked to be disabled.
    Gone,
    /// Any other status, or no response at all (timeout, connect error).
    Failed,
}

/// Classify an attempt by its HTTP status; `None` means no response arrived.
pub fn classify(status_code: Option<u16>) -> ResponseClass {
    match status_code {
        Some(code) if (200..300).contains(&code) => ResponseClass::Delivered,
        Some(410) => ResponseClass::Gone,
        _ => ResponseClass::Failed,
    }
}

// ---------------------------------------------------------------------------
// Retry policy + transitions
// ---------------------------------------------------------------------------

/// The retry settings of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_enabled: bool,
    /// Number of retries allowed after the first attempt.
    pub max_retries: i32,
}

impl RetryPolicy {
    /// Whether another attempt may follow a failed `attempt_number`.
    ///
    /// Attempt 1 is the first delivery, so `max_retries = N` allows
    /// attempts `1..=N+1`.
    pub fn allows_retry_after(&self, attempt_number: i32) -> bool {
        self.retry_enabled && attempt_number <= self.max_retries
    }
}

/// Delay before retrying after the given (failed) attempt number.
///
/// Attempts past the end of the ladder reuse its last entry.
pub fn retry_delay(attempt_number: i32) -> Duration {
    let index = (attempt_number.max(1) - 1).min(BACKOFF_LADDER_SECS.len() as i32 - 1);
    Duration::seconds(BACKOFF_LADDER_SECS[index as usize])
}

/// State reached after an attempt resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: DeliveryStatus,
    pub next_retry_at: Option<Timestamp>,
    /// The subscription must be deactivated (410 Gone).
    pub disable_subscription: bool,
}

impl Transition {
    pub fn succeeded(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// Decide the next delivery state for a resolved attempt.
pub fn next_transition(
    class: ResponseClass,
    policy: RetryPolicy,
    attempt_number: i32,
    now: Timestamp,
) -> Transition {
    match class {
        ResponseClass::Delivered => Transition {
            status: DeliveryStatus::Success,
            next_retry_at: None,
            disable_subscription: false,
        },
        ResponseClass::Gone => Transition {
            status: DeliveryStatus::Disabled,
            next_retry_at: None,
            disable_subscription: true,
        },
        ResponseClass::Failed if policy.allows_retry_after(attempt_number) => Transition {
            status: DeliveryStatus::Retrying,
            next_retry_at: Some(now + retry_delay(attempt_number)),
            disable_subscription: false,
        },
        ResponseClass::Failed => Transition {
            status: DeliveryStatus::Failed,
            next_retry_at: None,
            disable_subscription: false,
        },
    }
}

// ---------------------------------------------------------------------------
// Response body truncation
// ---------------------------------------------------------------------------

/// Truncate a response body to at most `cap` bytes on a char boundary.
pub fn truncate_body(body: &str, cap: usize) -> String {
    if body.len() <= cap {
        return body.to_string();
    }
    let mut end = cap;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Normalize a claim time to the microsecond precision Postgres stores.
///
/// Writes for a claimed delivery match on the exact `claimed_at` value, so
/// the value handed out must survive a round trip through the database.
pub fn claim_stamp(at: Timestamp) -> Timestamp {
    at.trunc_subsecs(6)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn policy(retry_enabled: bool, max_retries: i32) -> RetryPolicy {
        RetryPolicy {
            retry_enabled,
            max_retries,
        }
    }

    // -- Status ------------------------------------------------------------

    #[test]
    fn status_parses_its_own_string() {
        for status in DeliveryStatus::ALL {
            assert_eq!(status.as_str().parse::<DeliveryStatus>(), Ok(status));
        }
        assert_eq!("retrying".parse::<DeliveryStatus>(), Ok(DeliveryStatus::Retrying));
        assert!("DONE".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(DeliveryStatus::Success.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(DeliveryStatus::Disabled.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Retrying.is_terminal());
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&DeliveryStatus::Retrying).unwrap();
        assert_eq!(json, "\"RETRYING\"");
    }

    // -- Classification ----------------------------------------------------

    #[test]
    fn classify_covers_success_gone_and_failures() {
        assert_eq!(classify(Some(200)), ResponseClass::Delivered);
        assert_eq!(classify(Some(204)), ResponseClass::Delivered);
        assert_eq!(classify(Some(299)), ResponseClass::Delivered);
        assert_eq!(classify(Some(410)), ResponseClass::Gone);
        assert_eq!(classify(Some(301)), ResponseClass::Failed);
        assert_eq!(classify(Some(404)), ResponseClass::Failed);
        assert_eq!(classify(Some(503)), ResponseClass::Failed);
        assert_eq!(classify(None), ResponseClass::Failed);
    }

    // -- Backoff -----------------------------------------------------------

    #[test]
    fn backoff_ladder_is_five_minutes_one_hour_six_hours() {
        assert_eq!(retry_delay(1), Duration::minutes(5));
        assert_eq!(retry_delay(2), Duration::hours(1));
        assert_eq!(retry_delay(3), Duration::hours(6));
    }

    #[test]
    fn backoff_is_clamped_at_last_entry() {
        assert_eq!(retry_delay(4), Duration::hours(6));
        assert_eq!(retry_delay(11), Duration::hours(6));
    }

    #[test]
    fn backoff_treats_nonpositive_attempts_as_first() {
        assert_eq!(retry_delay(0), Duration::minutes(5));
    }

    // -- Transitions -------------------------------------------------------

    #[test]
    fn success_is_terminal_without_retry() {
        let t = next_transition(ResponseClass::Delivered, policy(true, 3), 1, Utc::now());
        assert_eq!(t.status, DeliveryStatus::Success);
        assert!(t.next_retry_at.is_none());
        assert!(!t.disable_subscription);
        assert!(t.succeeded());
    }

    #[test]
    fn gone_disables_even_with_retries_left() {
        let t = next_transition(ResponseClass::Gone, policy(true, 10), 1, Utc::now());
        assert_eq!(t.status, DeliveryStatus::Disabled);
        assert!(t.next_retry_at.is_none());
        assert!(t.disable_subscription);
    }

    #[test]
    fn failure_without_retry_enabled_is_terminal() {
        let t = next_transition(ResponseClass::Failed, policy(false, 10), 1, Utc::now());
        assert_eq!(t.status, DeliveryStatus::Failed);
        assert!(t.next_retry_at.is_none());
    }

    #[test]
    fn failure_schedules_retry_with_ladder_delay() {
        let now = Utc::now();
        let t = next_transition(ResponseClass::Failed, policy(true, 3), 2, now);
        assert_eq!(t.status, DeliveryStatus::Retrying);
        assert_eq!(t.next_retry_at, Some(now + Duration::hours(1)));
    }

    #[test]
    fn max_retries_n_allows_n_plus_one_attempts() {
        for max_retries in 0..=10 {
            let p = policy(true, max_retries);
            let mut attempts = 0;
            let mut attempt_number = 1;
            loop {
                attempts += 1;
                let t = next_transition(ResponseClass::Failed, p, attempt_number, Utc::now());
                if t.status != DeliveryStatus::Retrying {
                    assert_eq!(t.status, DeliveryStatus::Failed);
                    break;
                }
                attempt_number += 1;
            }
            assert_eq!(attempts, max_retries + 1, "max_retries = {max_retries}");
        }
    }

    #[test]
    fn next_retry_at_set_only_when_retrying() {
        let now = Utc::now();
        for class in [
            ResponseClass::Delivered,
            ResponseClass::Gone,
            ResponseClass::Failed,
        ] {
            for attempt in 1..=5 {
                let t = next_transition(class, policy(true, 3), attempt, now);
                assert_eq!(
                    t.next_retry_at.is_some(),
                    t.status == DeliveryStatus::Retrying
                );
            }
        }
    }

    // -- Truncation --------------------------------------------------------

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate_body("ok", RESPONSE_BODY_CAP), "ok");
    }

    #[test]
    fn truncate_caps_long_bodies() {
        let body = "x".repeat(5000);
        assert_eq!(truncate_body(&body, RESPONSE_BODY_CAP).len(), RESPONSE_BODY_CAP);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // 'é' is two bytes; a cap of 3 must not split the second one.
        assert_eq!(truncate_body("éé", 3), "é");
    }

    // -- Claims ------------------------------------------------------------

    #[test]
    fn claim_stamp_drops_sub_microsecond_precision() {
        let at = chrono::DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let stamped = claim_stamp(at);
        assert_eq!(stamped.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(claim_stamp(stamped), stamped);
    }
}
