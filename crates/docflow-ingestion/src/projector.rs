//! Projects job status onto the owning document.

use std::sync::Arc;

use docflow_core::result::AppResult;
use docflow_core::types::id::DocumentId;
use docflow_entity::document::status::DocumentProcessingStatus;
use docflow_entity::job::model::Job;
use docflow_entity::job::status::JobStatus;

use crate::store::DocumentGateway;

/// Writes a document's processing status from a job status.
#[derive(Debug, Clone)]
pub struct DocumentStatusProjector {
    documents: Arc<dyn DocumentGateway>,
}

impl DocumentStatusProjector {
    /// Create a projector over a document gateway.
    pub fn new(documents: Arc<dyn DocumentGateway>) -> Self {
        Self { documents }
    }

    /// Map `job_status` and write it to the document.
    pub async fn project(
        &self,
        document_id: DocumentId,
        job_status: JobStatus,
    ) -> AppResult<DocumentProcessingStatus> {
        let status = DocumentProcessingStatus::from(job_status);
        self.documents
            .set_processing_status(document_id, status)
            .await?;
        Ok(status)
    }

    /// Project a job's status, logging instead of failing.
    ///
    /// Job state is authoritative, so a failed projection never rolls back
    /// the job write that caused it.
    pub async fn project_job(&self, job: &Job) {
        match self.project(job.document_id, job.status).await {
            Ok(status) => tracing::debug!(
                job_id = %job.id,
                document_id = %job.document_id,
                status = %status,
                "Document status projected"
            ),
            Err(e) => tracing::warn!(
                job_id = %job.id,
                document_id = %job.document_id,
                job_status = %job.status,
                error = %e,
                "Document status projection failed"
            ),
        }
    }
}
