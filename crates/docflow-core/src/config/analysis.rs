//! External analysis service configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Which analysis client implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisProvider {
    /// Talk to a real analysis service over HTTP.
    Http,
    /// In-process stand-in that accepts everything.
    #[default]
    Simulated,
}

impl fmt::Display for AnalysisProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Analysis service connection settings.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Client implementation.
    #[serde(default)]
    pub provider: AnalysisProvider,
    /// Base URL of the analysis service (required for `http`).
    #[serde(default)]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_seconds: u64,
    /// Simulated provider only: every N-th poll reports a failure (0 = never).
    #[serde(default)]
    pub simulated_failure_every: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: AnalysisProvider::default(),
            base_url: String::new(),
            request_timeout_seconds: default_request_timeout(),
            simulated_failure_every: 0,
        }
    }
}

impl AnalysisConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Provider-specific checks.
    pub fn check_provider(&self) -> Result<(), AppError> {
        if self.provider == AnalysisProvider::Http && self.base_url.trim().is_empty() {
            return Err(AppError::configuration(
                "analysis.base_url is required when analysis.provider = \"http\"",
            ));
        }
        Ok(())
    }
}

fn default_request_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_requires_base_url() {
        let config = AnalysisConfig {
            provider: AnalysisProvider::Http,
            ..Default::default()
        };
        assert!(config.check_provider().is_err());

        let config = AnalysisConfig {
            provider: AnalysisProvider::Http,
            base_url: "http://localhost:8000".to_string(),
            ..Default::default()
        };
        assert!(config.check_provider().is_ok());
    }

    #[test]
    fn test_simulated_needs_nothing() {
        let config = AnalysisConfig::default();
        assert_eq!(config.provider, AnalysisProvider::Simulated);
        assert!(config.check_provider().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
