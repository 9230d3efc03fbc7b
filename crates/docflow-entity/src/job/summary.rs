//! Compact job view handed back to callers that trigger ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_core::types::id::{DocumentId, JobId};

use super::model::Job;
use super::status::JobStatus;

/// Snapshot returned right after a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    /// Job identifier.
    pub job_id: JobId,
    /// Document being ingested.
    pub document_id: DocumentId,
    /// Status at the time of the snapshot.
    pub status: JobStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            document_id: job.document_id,
            status: job.status,
            created_at: job.created_at,
        }
    }
}
