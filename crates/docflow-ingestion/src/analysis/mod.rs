//! Client side of the external document analysis service.
//!
//! The service exposes two operations: accept a document for processing,
//! and report the outcome for a job. Every error here is treated as
//! transient by the orchestrator.

pub mod http;
pub mod simulated;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docflow_core::config::{AnalysisConfig, AnalysisProvider};
use docflow_core::result::AppResult;
use docflow_core::types::id::JobId;
use docflow_entity::document::model::Document;

pub use self::http::HttpAnalysisClient;
pub use self::simulated::SimulatedAnalysisClient;

/// Acknowledgment returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    /// Job the submission belongs to.
    pub job_id: JobId,
    /// Identifier assigned by the remote service, if it returns one.
    pub reference: Option<String>,
}

/// Outcome reported by the analysis service for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    /// Still working.
    #[serde(alias = "processing")]
    Processing,
    /// Finished successfully.
    #[serde(alias = "completed")]
    Completed,
    /// Gave up on the document.
    #[serde(alias = "failed")]
    Failed,
}

/// Poll response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Current outcome.
    pub status: AnalysisStatus,
    /// Failure detail when `status` is `Failed`.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl AnalysisReport {
    /// A completed report.
    pub fn completed() -> Self {
        Self {
            status: AnalysisStatus::Completed,
            error_message: None,
        }
    }

    /// A report that is still in progress.
    pub fn processing() -> Self {
        Self {
            status: AnalysisStatus::Processing,
            error_message: None,
        }
    }

    /// A failed report with the given detail.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Failed,
            error_message: Some(message.into()),
        }
    }
}

/// Errors raised while talking to the analysis service.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The request never produced a response.
    #[error("Analysis service request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Analysis service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response could not be understood.
    #[error("Invalid response from analysis service: {0}")]
    InvalidResponse(String),
}

/// The two operations the orchestrator needs from the analysis service.
#[async_trait]
pub trait AnalysisClient: Send + Sync + fmt::Debug {
    /// Hand a document to the service for processing.
    async fn submit(&self, job_id: JobId, document: &Document)
    -> Result<SubmissionAck, AnalysisError>;

    /// Check the outcome for a previously submitted job. Idempotent.
    async fn poll(&self, job_id: JobId) -> Result<AnalysisReport, AnalysisError>;
}

/// Build the client selected by `analysis.provider`.
pub fn from_config(config: &AnalysisConfig) -> AppResult<Arc<dyn AnalysisClient>> {
    let client: Arc<dyn AnalysisClient> = match config.provider {
        AnalysisProvider::Http => Arc::new(HttpAnalysisClient::new(config)?),
        AnalysisProvider::Simulated => {
            Arc::new(SimulatedAnalysisClient::new(config.simulated_failure_every))
        }
    };
    tracing::info!(provider = %config.provider, "Analysis client initialized");
    Ok(client)
}
