//! Retry policy and ignore lists.

use corral_core::SyncError;
use serde::Deserialize;
use std::time::Duration;

/// Exponential-backoff retry policy for transient task failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in seconds; attempt `n` waits `base * 2^(n+1)`.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Upper bound on a single delay.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    11
}

fn default_base_delay_secs() -> u64 {
    60
}

fn default_max_delay_secs() -> u64 {
    86_400
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
            ..Self::default()
        }
    }

    /// Whether a retry may still be scheduled at this attempt number.
    pub fn should_retry(&self, attempt: u32, error: &SyncError) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    /// Delay before re-running attempt `attempt + 1`.
    ///
    /// Doubles per attempt, starting at twice the base delay, capped at
    /// `max_delay_secs`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_secs
            .saturating_mul(2u64.saturating_pow(attempt.saturating_add(1)));
        Duration::from_secs(exponential.min(self.max_delay_secs))
    }
}

/// Data-driven overrides to the kind-based classification.
///
/// Both lists match substrings of the stringified error. They exist for
/// vendor error text that carries meaning the transport status does not:
/// a rejected email address arrives as an ordinary request failure but
/// will never succeed, and some exhausted retries are routine enough that
/// nobody should be paged.
#[derive(Debug, Clone, Deserialize)]
pub struct IgnoreLists {
    /// Errors treated as success no-ops: no retry, no failure record.
    #[serde(default = "default_never_retry")]
    pub never_retry: Vec<String>,

    /// Errors that still stop the task after retries are exhausted but do
    /// not get recorded for operator attention.
    #[serde(default = "default_no_alert_after_retries")]
    pub no_alert_after_retries: Vec<String>,
}

fn default_never_retry() -> Vec<String> {
    vec![
        "InvalidEmailAddress".to_string(),
        "An invalid phone number was provided".to_string(),
    ]
}

fn default_no_alert_after_retries() -> Vec<String> {
    vec!["There are no valid subscribers".to_string()]
}

impl Default for IgnoreLists {
    fn default() -> Self {
        Self {
            never_retry: default_never_retry(),
            no_alert_after_retries: default_no_alert_after_retries(),
        }
    }
}

impl IgnoreLists {
    /// Whether the error should be swallowed as a success no-op.
    pub fn matches_never_retry(&self, error: &SyncError) -> bool {
        Self::matches(&self.never_retry, error)
    }

    /// Whether an exhausted-retries failure should skip operator alerting.
    pub fn matches_no_alert(&self, error: &SyncError) -> bool {
        Self::matches(&self.no_alert_after_retries, error)
    }

    fn matches(list: &[String], error: &SyncError) -> bool {
        let message = error.to_string();
        list.iter().any(|needle| message.contains(needle))
    }
}
