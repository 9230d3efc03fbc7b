//! Ingestion job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docflow_core::error::AppError;
use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};

use super::status::JobStatus;

/// One document's pass through the ingestion pipeline.
///
/// The transition methods below are the only way the orchestrator mutates
/// a job; each one refreshes `updated_at` and keeps `completed_at` set
/// exactly when the status is `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// The document being ingested.
    pub document_id: DocumentId,
    /// Current job status.
    pub status: JobStatus,
    /// Last failure reported for this job.
    pub error_message: Option<String>,
    /// Number of retries scheduled so far.
    pub retry_count: i32,
    /// When the job completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a fresh pending job for a document.
    pub fn new(document_id: DocumentId, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            document_id,
            status: JobStatus::Pending,
            error_message: None,
            retry_count: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `Pending -> Processing`.
    pub fn begin_processing(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        self.expect_status(&[JobStatus::Pending], JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.updated_at = now;
        Ok(())
    }

    /// `Processing -> Completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        self.expect_status(&[JobStatus::Processing], JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Record a failure and move back to `Pending` for another attempt.
    pub fn schedule_retry(&mut self, error: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.expect_status(&[JobStatus::Pending, JobStatus::Processing], JobStatus::Pending)?;
        self.error_message = Some(error.to_string());
        self.retry_count += 1;
        self.status = JobStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// Record a failure and stop for good.
    pub fn fail(&mut self, error: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.expect_status(&[JobStatus::Pending, JobStatus::Processing], JobStatus::Failed)?;
        self.error_message = Some(error.to_string());
        self.status = JobStatus::Failed;
        self.updated_at = now;
        Ok(())
    }

    /// Whether the job's last write happened before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == JobStatus::Processing && self.updated_at < cutoff
    }

    fn expect_status(&self, allowed: &[JobStatus], target: JobStatus) -> AppResult<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(AppError::conflict(format!(
                "Ingestion job {} cannot move from {} to {}",
                self.id, self.status, target
            )))
        }
    }
}
