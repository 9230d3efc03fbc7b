//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod analysis;
pub mod database;
pub mod ingestion;
pub mod logging;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::analysis::{AnalysisConfig, AnalysisProvider};
pub use self::database::DatabaseConfig;
pub use self::ingestion::IngestionConfig;
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Ingestion pipeline timing and retry settings.
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// External analysis service settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `DOCFLOW__`, then validates
    /// the result once.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DOCFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate_all()?;
        tracing::debug!(env, "Configuration loaded");
        Ok(config)
    }

    /// Validate every section that carries constraints.
    pub fn validate_all(&self) -> Result<(), AppError> {
        self.ingestion.validate()?;
        self.ingestion.check_timing()?;
        self.analysis.validate()?;
        self.analysis.check_provider()?;
        Ok(())
    }
}
