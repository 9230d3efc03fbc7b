//! Document repository implementation (status column only).

use sqlx::PgPool;

use docflow_core::error::{AppError, ErrorKind};
use docflow_core::result::AppResult;
use docflow_core::types::id::DocumentId;
use docflow_entity::document::model::Document;
use docflow_entity::document::status::DocumentProcessingStatus;

/// Repository for the `documents` table as seen by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    /// Create a new document repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a document by ID.
    pub async fn find_by_id(&self, id: DocumentId) -> AppResult<Option<Document>> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find document", e))
    }

    /// Read only the processing status.
    pub async fn processing_status(
        &self,
        id: DocumentId,
    ) -> AppResult<Option<DocumentProcessingStatus>> {
        sqlx::query_scalar::<_, DocumentProcessingStatus>(
            "SELECT processing_status FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to read document status", e)
        })
    }

    /// Set the processing status. Returns `false` if the document is gone.
    pub async fn update_processing_status(
        &self,
        id: DocumentId,
        status: DocumentProcessingStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET processing_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update document status", e)
        })?;
        Ok(result.rows_affected() > 0)
    }
}
