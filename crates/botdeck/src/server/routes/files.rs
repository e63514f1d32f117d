//! File upload, download and management endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::server::routes::owned_project;
use crate::server::state::AppState;
use crate::storage::UploadStore;
use crate::types::StoredFile;

/// MIME types accepted for upload, next to the blanket `text/*` rule
const ALLOWED_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "application/pdf",
    "application/json",
    "text/csv",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime) || mime.starts_with("text/")
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<StoredFile>,
}

#[derive(Debug, Serialize)]
pub struct DeleteFileResponse {
    pub message: String,
}

/// Resolve a file through its owning project; a broken chain reads as a
/// missing file.
fn owned_file(state: &AppState, user_id: &Uuid, file_id: &Uuid) -> Result<StoredFile> {
    let file = state.db().get_file(file_id)?.ok_or(Error::NotFound("File"))?;

    state
        .db()
        .get_project_owned(&file.project_id, user_id)?
        .ok_or(Error::NotFound("File"))?;

    Ok(file)
}

/// GET /api/files/project/:project_id - A project's files
pub async fn list_files(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<FileListResponse>> {
    let project = owned_project(&state, &auth.id, &project_id)?;
    let files = state.db().list_files_for_project(&project.id)?;

    Ok(Json(FileListResponse { files }))
}

/// POST /api/files/project/:project_id - Upload one file (multipart `file`
/// field). Validation runs before anything is written, so a rejected upload
/// leaves no bytes on disk.
pub async fn upload_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>)> {
    let project = owned_project(&state, &auth.id, &project_id)?;

    // First part carrying a filename is the upload
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(original_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        let declared_mime = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("Failed to read file: {}", e)))?;

        upload = Some((original_name, declared_mime, data));
        break;
    }

    let Some((original_name, declared_mime, data)) = upload else {
        return Err(Error::validation("file", "No file uploaded"));
    };

    let mime_type = declared_mime.unwrap_or_else(|| {
        mime_guess::from_path(&original_name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string()
    });

    if !is_allowed_mime(&mime_type) {
        return Err(Error::FileTypeNotAllowed(mime_type));
    }

    let max_upload_size = state.config().server.max_upload_size;
    if data.len() > max_upload_size {
        return Err(Error::FileTooLarge(max_upload_size));
    }

    let content_hash = hex::encode(Sha256::digest(&data));
    let stored_name = UploadStore::stored_name_for(&original_name);

    state.uploads().save(&stored_name, &data).await?;

    let file = StoredFile::new(
        stored_name.clone(),
        original_name,
        mime_type,
        data.len() as u64,
        content_hash,
        project.id,
    );

    if let Err(e) = state.db().insert_file(&file) {
        // Do not leave bytes behind for a record that never landed
        state.uploads().remove(&stored_name).await.ok();
        return Err(e);
    }

    tracing::info!(
        "Uploaded {} ({} bytes) to project {}",
        file.original_name,
        file.size,
        project.id
    );

    Ok((StatusCode::CREATED, Json(file)))
}

/// GET /api/files/:id/download - Stored bytes with the original filename as
/// the suggested download name
pub async fn download_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let file = owned_file(&state, &auth.id, &id)?;

    let bytes = state
        .uploads()
        .read(&file.stored_name)
        .await?
        .ok_or(Error::NotFound("File"))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.original_name.replace(['"', '\r', '\n'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, file.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// DELETE /api/files/:id - Remove the bytes, then the record
pub async fn delete_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteFileResponse>> {
    let file = owned_file(&state, &auth.id, &id)?;

    state.uploads().remove(&file.stored_name).await?;
    state.db().delete_file(&file.id)?;

    Ok(Json(DeleteFileResponse {
        message: "File deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_covers_common_document_types() {
        assert!(is_allowed_mime("text/plain"));
        assert!(is_allowed_mime("application/pdf"));
        assert!(is_allowed_mime("text/x-rust"));
        assert!(is_allowed_mime(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        ));
    }

    #[test]
    fn binary_types_are_rejected() {
        assert!(!is_allowed_mime("application/octet-stream"));
        assert!(!is_allowed_mime("image/png"));
        assert!(!is_allowed_mime("application/x-msdownload"));
        assert!(!is_allowed_mime("video/mp4"));
    }
}
