//! `JobStore` and `DocumentGateway` over the PostgreSQL repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use docflow_core::error::AppError;
use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_database::repositories::{DocumentRepository, JobRepository};
use docflow_entity::document::model::Document;
use docflow_entity::document::status::DocumentProcessingStatus;
use docflow_entity::job::model::Job;
use docflow_entity::job::status::JobStatus;

use super::{DocumentGateway, JobStore};

#[async_trait]
impl JobStore for JobRepository {
    async fn create(&self, job: &Job) -> AppResult<Job> {
        JobRepository::create(self, job).await
    }

    async fn save(&self, job: &Job) -> AppResult<Job> {
        self.update(job).await
    }

    async fn compare_and_save(
        &self,
        job: &Job,
        expected_status: JobStatus,
        expected_updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.compare_and_update(job, expected_status, expected_updated_at)
            .await
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        JobRepository::find_by_id(self, id).await
    }

    async fn find_by_document(&self, document_id: DocumentId) -> AppResult<Vec<Job>> {
        JobRepository::find_by_document(self, document_id).await
    }

    async fn find_stale(
        &self,
        status: JobStatus,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<Job>> {
        JobRepository::find_stale(self, status, older_than).await
    }

    async fn find_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        JobRepository::find_by_status(self, status).await
    }
}

#[async_trait]
impl DocumentGateway for DocumentRepository {
    async fn find_by_id(&self, id: DocumentId) -> AppResult<Option<Document>> {
        DocumentRepository::find_by_id(self, id).await
    }

    async fn get_processing_status(
        &self,
        id: DocumentId,
    ) -> AppResult<Option<DocumentProcessingStatus>> {
        self.processing_status(id).await
    }

    async fn set_processing_status(
        &self,
        id: DocumentId,
        status: DocumentProcessingStatus,
    ) -> AppResult<()> {
        if self.update_processing_status(id, status).await? {
            Ok(())
        } else {
            Err(AppError::not_found(format!("Document with ID {id} not found")))
        }
    }
}
