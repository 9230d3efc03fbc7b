//! Retry decision and backoff schedule.

use std::time::Duration;

use docflow_core::config::IngestionConfig;

/// Largest exponent applied to the base delay.
const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Pure retry policy: whether a failed job gets another attempt, and how
/// long to wait before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: i32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with an explicit cap and base delay.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: i32::try_from(max_retries).unwrap_or(i32::MAX),
            base_delay,
        }
    }

    /// Build the policy from the ingestion section of the config.
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(config.max_retries, config.base_backoff())
    }

    /// Retry cap.
    pub fn max_retries(&self) -> i32 {
        self.max_retries
    }

    /// A failure seen at `retry_count` is retried while the cap is not reached.
    pub fn should_retry(&self, retry_count: i32) -> bool {
        retry_count < self.max_retries
    }

    /// `base * 2^retry_count`. Callers pass the already incremented count.
    pub fn backoff_delay(&self, retry_count: i32) -> Duration {
        let exponent = retry_count.clamp(0, MAX_BACKOFF_EXPONENT as i32) as u32;
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&IngestionConfig::default())
    }
}
