//! DashMap-backed stores for tests and database-less runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use docflow_core::error::AppError;
use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_entity::document::model::Document;
use docflow_entity::document::status::DocumentProcessingStatus;
use docflow_entity::job::model::Job;
use docflow_entity::job::status::JobStatus;

use super::{DocumentGateway, JobStore};

/// In-memory job store.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, Job>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> AppResult<Job> {
        match self.jobs.entry(job.id) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Ingestion job with ID {} already exists",
                job.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(job.clone())
            }
        }
    }

    async fn save(&self, job: &Job) -> AppResult<Job> {
        let mut stored = self
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| AppError::not_found(format!("Ingestion job with ID {} not found", job.id)))?;
        *stored = job.clone();
        Ok(job.clone())
    }

    async fn compare_and_save(
        &self,
        job: &Job,
        expected_status: JobStatus,
        expected_updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        // The entry guard holds the shard lock, so check and write are atomic.
        let Some(mut stored) = self.jobs.get_mut(&job.id) else {
            return Ok(false);
        };
        if stored.status != expected_status || stored.updated_at != expected_updated_at {
            return Ok(false);
        }
        *stored = job.clone();
        Ok(true)
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_document(&self, document_id: DocumentId) -> AppResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.document_id == document_id)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });
        Ok(jobs)
    }

    async fn find_stale(
        &self,
        status: JobStatus,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.status == status && entry.updated_at < older_than)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.updated_at);
        Ok(jobs)
    }

    async fn find_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}

/// In-memory document table.
#[derive(Debug, Default)]
pub struct InMemoryDocumentGateway {
    documents: DashMap<DocumentId, Document>,
}

impl InMemoryDocumentGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document.
    pub fn insert(&self, document: Document) {
        self.documents.insert(document.id, document);
    }

    /// Remove a document, returning it if present.
    pub fn remove(&self, id: DocumentId) -> Option<Document> {
        self.documents.remove(&id).map(|(_, document)| document)
    }
}

#[async_trait]
impl DocumentGateway for InMemoryDocumentGateway {
    async fn find_by_id(&self, id: DocumentId) -> AppResult<Option<Document>> {
        Ok(self.documents.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_processing_status(
        &self,
        id: DocumentId,
    ) -> AppResult<Option<DocumentProcessingStatus>> {
        Ok(self.documents.get(&id).map(|entry| entry.processing_status))
    }

    async fn set_processing_status(
        &self,
        id: DocumentId,
        status: DocumentProcessingStatus,
    ) -> AppResult<()> {
        let mut document = self
            .documents
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Document with ID {id} not found")))?;
        document.processing_status = status;
        document.updated_at = Utc::now();
        Ok(())
    }
}
