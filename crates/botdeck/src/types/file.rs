//! Uploaded file types

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Metadata for an uploaded file; the bytes live in the upload directory
/// under `stored_name`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: Uuid,
    /// Name on disk (uuid plus the original extension)
    pub stored_name: String,
    /// Name the file was uploaded with
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    /// sha256 of the content, hex encoded
    #[serde(skip_serializing)]
    pub content_hash: String,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn new(
        stored_name: String,
        original_name: String,
        mime_type: String,
        size: u64,
        content_hash: String,
        project_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stored_name,
            original_name,
            mime_type,
            size,
            content_hash,
            project_id,
            created_at: Utc::now(),
        }
    }
}
