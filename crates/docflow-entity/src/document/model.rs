//! Document entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use docflow_core::types::id::DocumentId;

use super::status::DocumentProcessingStatus;

/// An uploaded document.
///
/// Only `processing_status` is written by the ingestion pipeline; every
/// other field belongs to the upload and document-management layers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    /// Unique document identifier.
    pub id: DocumentId,
    /// Display title.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Original upload file name.
    pub file_name: String,
    /// Where the upload layer stored the file.
    pub file_path: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MIME type reported at upload.
    pub mime_type: String,
    /// Projection of the latest ingestion job's status.
    pub processing_status: DocumentProcessingStatus,
    /// Owning user.
    pub owner_id: Option<Uuid>,
    /// When the document was created.
    pub created_at: DateTime<Utc>,
    /// When the document was last updated.
    pub updated_at: DateTime<Utc>,
}
