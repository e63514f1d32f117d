//! Application state for the platform server

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::llm::{ChatProvider, OpenRouterClient};
use crate::storage::{Database, UploadStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: AppConfig,
    /// SQLite store
    db: Database,
    /// Uploaded file bytes
    uploads: UploadStore,
    /// Upstream completion provider
    llm: Arc<dyn ChatProvider>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let db = Database::open(&config.storage.database_path)?;
        tracing::info!("Database opened at {}", config.storage.database_path.display());

        let uploads = UploadStore::new(&config.storage.upload_dir)?;
        tracing::info!("Upload store at {}", config.storage.upload_dir.display());

        let llm: Arc<dyn ChatProvider> = Arc::new(OpenRouterClient::new(&config.llm));
        tracing::info!("Completion provider initialized ({})", llm.name());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                uploads,
                llm,
            }),
        })
    }

    /// Assemble state from parts (for testing with an in-memory database and
    /// a scripted provider)
    #[cfg(test)]
    pub fn for_tests(db: Database, uploads: UploadStore, llm: Arc<dyn ChatProvider>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config: AppConfig::default(),
                db,
                uploads,
                llm,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get the SQLite store
    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    /// Get the upload store
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }

    /// Get the completion provider
    pub fn llm(&self) -> Arc<dyn ChatProvider> {
        Arc::clone(&self.inner.llm)
    }
}
