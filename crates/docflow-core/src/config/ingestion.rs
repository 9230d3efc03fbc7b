//! Ingestion pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Timing and retry settings for the ingestion orchestrator.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Maximum number of retries before a job is marked failed.
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 0, max = 10))]
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_base_backoff_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub base_backoff_ms: u64,
    /// Delay between submitting a document and polling for its outcome.
    #[serde(default = "default_processing_delay")]
    #[validate(range(min = 1, max = 3600))]
    pub processing_delay_seconds: u64,
    /// Interval between stale-job sweeps.
    #[serde(default = "default_sweep_interval")]
    #[validate(range(min = 1, max = 86400))]
    pub sweep_interval_seconds: u64,
    /// Age after which a processing job is presumed lost.
    #[serde(default = "default_staleness_threshold")]
    #[validate(range(min = 1, max = 604800))]
    pub staleness_threshold_seconds: u64,
    /// Re-drive pending jobs left behind by a previous process on startup.
    #[serde(default = "default_true")]
    pub resume_pending_on_startup: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            processing_delay_seconds: default_processing_delay(),
            sweep_interval_seconds: default_sweep_interval(),
            staleness_threshold_seconds: default_staleness_threshold(),
            resume_pending_on_startup: default_true(),
        }
    }
}

impl IngestionConfig {
    /// Base backoff delay.
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    /// Time between submit and the first poll.
    pub fn processing_delay(&self) -> Duration {
        Duration::from_secs(self.processing_delay_seconds)
    }

    /// Interval between stale-job sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Staleness threshold for processing jobs.
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_seconds)
    }

    /// Cross-field checks that `validator` range rules cannot express.
    ///
    /// A job is first polled one processing delay after it enters
    /// processing, so a threshold at or below that delay reaps jobs before
    /// their first poll.
    pub fn check_timing(&self) -> Result<(), AppError> {
        if self.staleness_threshold_seconds <= self.processing_delay_seconds {
            return Err(AppError::configuration(format!(
                "ingestion.staleness_threshold_seconds ({}) must exceed ingestion.processing_delay_seconds ({})",
                self.staleness_threshold_seconds, self.processing_delay_seconds
            )));
        }
        Ok(())
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_processing_delay() -> u64 {
    5
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_staleness_threshold() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestionConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_backoff(), Duration::from_secs(1));
        assert_eq!(config.processing_delay(), Duration::from_secs(5));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.staleness_threshold(), Duration::from_secs(600));
        assert!(config.validate().is_ok());
        assert!(config.check_timing().is_ok());
    }

    #[test]
    fn test_range_rules() {
        let config = IngestionConfig {
            max_retries: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IngestionConfig {
            base_backoff_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_must_exceed_processing_delay() {
        let config = IngestionConfig {
            processing_delay_seconds: 30,
            staleness_threshold_seconds: 30,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.check_timing().is_err());
    }
}
