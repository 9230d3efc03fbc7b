//! Ingestion job repository implementation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use docflow_core::error::{AppError, ErrorKind};
use docflow_core::result::AppResult;
use docflow_core::types::id::{DocumentId, JobId};
use docflow_entity::job::model::Job;
use docflow_entity::job::status::JobStatus;

const JOB_COLUMNS: &str =
    "id, document_id, status, error_message, retry_count, completed_at, created_at, updated_at";

/// Repository for the `ingestion_jobs` table.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    /// All jobs for a document, newest first.
    pub async fn find_by_document(&self, document_id: DocumentId) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE document_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list jobs for document", e)
        })
    }

    /// Jobs in `status` whose last write is older than `older_than`.
    pub async fn find_stale(
        &self,
        status: JobStatus,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE status = $1 AND updated_at < $2 \
             ORDER BY updated_at ASC"
        ))
        .bind(status)
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find stale jobs", e))
    }

    /// All jobs currently in `status`, oldest first.
    pub async fn find_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE status = $1 ORDER BY created_at ASC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list jobs by status", e)
        })
    }

    /// Insert a new job.
    pub async fn create(&self, job: &Job) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO ingestion_jobs \
             (id, document_id, status, error_message, retry_count, completed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {JOB_COLUMNS}"
        ))
        .bind(job.id)
        .bind(job.document_id)
        .bind(job.status)
        .bind(&job.error_message)
        .bind(job.retry_count)
        .bind(job.completed_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    /// Overwrite the mutable columns of a job unconditionally.
    pub async fn update(&self, job: &Job) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(&format!(
            "UPDATE ingestion_jobs SET status = $2, error_message = $3, retry_count = $4, \
             completed_at = $5, updated_at = $6 WHERE id = $1 RETURNING {JOB_COLUMNS}"
        ))
        .bind(job.id)
        .bind(job.status)
        .bind(&job.error_message)
        .bind(job.retry_count)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update job", e))?
        .ok_or_else(|| AppError::not_found(format!("Ingestion job with ID {} not found", job.id)))
    }

    /// Write `job` only if the stored row still has the expected status and
    /// `updated_at`. Returns `false` when another writer got there first.
    pub async fn compare_and_update(
        &self,
        job: &Job,
        expected_status: JobStatus,
        expected_updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE ingestion_jobs SET status = $2, error_message = $3, retry_count = $4, \
             completed_at = $5, updated_at = $6 \
             WHERE id = $1 AND status = $7 AND updated_at = $8",
        )
        .bind(job.id)
        .bind(job.status)
        .bind(&job.error_message)
        .bind(job.retry_count)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .bind(expected_status)
        .bind(expected_updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to conditionally update job", e)
        })?;
        Ok(result.rows_affected() > 0)
    }
}
