//! Persistence seams used by the orchestrator.
//!
//! `JobStore` is the source of truth for job state. `DocumentGateway` is
//! the narrow view of the document table the pipeline is allowed to touch.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_entity::document::model::Document;
use docflow_entity::document::status::DocumentProcessingStatus;
use docflow_entity::job::model::Job;
use docflow_entity::job::status::JobStatus;

pub use self::memory::{InMemoryDocumentGateway, InMemoryJobStore};

/// Durable job storage.
#[async_trait]
pub trait JobStore: Send + Sync + fmt::Debug {
    /// Insert a new job.
    async fn create(&self, job: &Job) -> AppResult<Job>;

    /// Overwrite a job unconditionally. Fails with NotFound for unknown ids.
    async fn save(&self, job: &Job) -> AppResult<Job>;

    /// Overwrite a job only if the stored copy still has `expected_status`
    /// and `expected_updated_at`. Returns whether the write landed.
    async fn compare_and_save(
        &self,
        job: &Job,
        expected_status: JobStatus,
        expected_updated_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Point lookup.
    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>>;

    /// All jobs for a document, newest first.
    async fn find_by_document(&self, document_id: DocumentId) -> AppResult<Vec<Job>>;

    /// Jobs in `status` last written before `older_than`.
    async fn find_stale(&self, status: JobStatus, older_than: DateTime<Utc>)
    -> AppResult<Vec<Job>>;

    /// All jobs in `status`.
    async fn find_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>>;
}

/// Read access to documents plus write access to their processing status.
#[async_trait]
pub trait DocumentGateway: Send + Sync + fmt::Debug {
    /// Resolve a document.
    async fn find_by_id(&self, id: DocumentId) -> AppResult<Option<Document>>;

    /// Current processing status, `None` if the document does not exist.
    async fn get_processing_status(
        &self,
        id: DocumentId,
    ) -> AppResult<Option<DocumentProcessingStatus>>;

    /// Set the processing status. Fails with NotFound if the document is gone.
    async fn set_processing_status(
        &self,
        id: DocumentId,
        status: DocumentProcessingStatus,
    ) -> AppResult<()>;
}
