//! In-process stand-in for the analysis service.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use docflow_core::types::id::JobId;
use docflow_entity::document::model::Document;

use super::{AnalysisClient, AnalysisError, AnalysisReport, SubmissionAck};

/// Failure detail reported by the simulated service.
pub const SIMULATED_FAILURE_MESSAGE: &str =
    "Mock processing failed due to document format issues";

/// Accepts every submission and completes every poll, except that every
/// `failure_every`-th poll reports a failure. `0` disables failures.
#[derive(Debug, Default)]
pub struct SimulatedAnalysisClient {
    failure_every: u32,
    polls: AtomicU64,
}

impl SimulatedAnalysisClient {
    /// Create a simulated client.
    pub fn new(failure_every: u32) -> Self {
        Self {
            failure_every,
            polls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl AnalysisClient for SimulatedAnalysisClient {
    async fn submit(
        &self,
        job_id: JobId,
        document: &Document,
    ) -> Result<SubmissionAck, AnalysisError> {
        tracing::debug!(
            job_id = %job_id,
            document_id = %document.id,
            "Simulated analysis accepted document"
        );
        Ok(SubmissionAck {
            job_id,
            reference: None,
        })
    }

    async fn poll(&self, job_id: JobId) -> Result<AnalysisReport, AnalysisError> {
        let n = self.polls.fetch_add(1, Ordering::Relaxed) + 1;
        if self.failure_every > 0 && n % u64::from(self.failure_every) == 0 {
            tracing::debug!(job_id = %job_id, poll = n, "Simulated analysis failure");
            return Ok(AnalysisReport::failed(SIMULATED_FAILURE_MESSAGE));
        }
        Ok(AnalysisReport::completed())
    }
}
