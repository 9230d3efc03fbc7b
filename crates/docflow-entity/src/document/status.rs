//! Document processing status and its derivation from job status.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::status::JobStatus;

/// Processing state shown on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "document_processing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentProcessingStatus {
    /// Never ingested.
    #[default]
    NotProcessed,
    /// A job is pending or processing.
    Processing,
    /// The latest job completed.
    Processed,
    /// The latest job exhausted its retries.
    Failed,
}

impl DocumentProcessingStatus {
    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotProcessed => "not_processed",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl From<JobStatus> for DocumentProcessingStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending | JobStatus::Processing => Self::Processing,
            JobStatus::Completed => Self::Processed,
            JobStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for DocumentProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_table() {
        assert_eq!(
            DocumentProcessingStatus::from(JobStatus::Pending),
            DocumentProcessingStatus::Processing
        );
        assert_eq!(
            DocumentProcessingStatus::from(JobStatus::Processing),
            DocumentProcessingStatus::Processing
        );
        assert_eq!(
            DocumentProcessingStatus::from(JobStatus::Completed),
            DocumentProcessingStatus::Processed
        );
        assert_eq!(
            DocumentProcessingStatus::from(JobStatus::Failed),
            DocumentProcessingStatus::Failed
        );
    }

    #[test]
    fn test_default_is_not_processed() {
        assert_eq!(
            DocumentProcessingStatus::default(),
            DocumentProcessingStatus::NotProcessed
        );
        assert_eq!(DocumentProcessingStatus::NotProcessed.to_string(), "not_processed");
    }
}
