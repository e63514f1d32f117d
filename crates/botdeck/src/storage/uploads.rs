//! On-disk storage for uploaded file bytes
//!
//! Files are written under a single upload directory with a generated name
//! (uuid plus the original extension); the original filename only lives in
//! the database record.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;

/// Directory-backed byte store for uploads
#[derive(Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Create the store, making the directory when missing
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Generate a stored name keeping the original extension
    pub fn stored_name_for(original_name: &str) -> String {
        match Path::new(original_name).extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
            _ => Uuid::new_v4().to_string(),
        }
    }

    /// Absolute path of a stored file
    pub fn path_of(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }

    /// Write the bytes of a new upload
    pub async fn save(&self, stored_name: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(self.path_of(stored_name), bytes).await?;
        Ok(())
    }

    /// Read a stored file back; `None` when the bytes are gone
    pub async fn read(&self, stored_name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_of(stored_name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored file; missing bytes are not an error
    pub async fn remove(&self, stored_name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_of(stored_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a batch of stored files, logging rather than failing on errors.
    /// Used by cascade deletes, which are best-effort by design.
    pub async fn remove_all(&self, stored_names: &[String]) {
        for name in stored_names {
            if let Err(e) = self.remove(name).await {
                tracing::warn!("Failed to remove uploaded file {}: {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_read_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();

        let name = UploadStore::stored_name_for("notes.txt");
        assert!(name.ends_with(".txt"));

        store.save(&name, b"hello").await.unwrap();
        assert_eq!(store.read(&name).await.unwrap().unwrap(), b"hello");

        store.remove(&name).await.unwrap();
        assert!(store.read(&name).await.unwrap().is_none());

        // Second remove is a no-op
        store.remove(&name).await.unwrap();
    }

    #[test]
    fn stored_name_without_extension() {
        let name = UploadStore::stored_name_for("README");
        assert!(!name.contains('.'));
    }
}
