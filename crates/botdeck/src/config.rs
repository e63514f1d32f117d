//! Configuration for the platform

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main platform configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Auth configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Upstream completion API configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            enable_cors: true,
            max_upload_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Auth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign bearer tokens
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 7 days)
    pub token_ttl_secs: i64,
    /// Shared secret gating the admin bootstrap endpoint
    pub admin_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            token_ttl_secs: 7 * 24 * 60 * 60,
            admin_secret: String::new(),
        }
    }
}

/// Upstream completion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the completion API
    pub base_url: String,
    /// API key (empty means unconfigured)
    pub api_key: String,
    /// Referer header sent upstream
    pub referer: String,
    /// Application title header sent upstream
    pub app_title: String,
    /// Max tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            referer: "http://localhost:5173".to_string(),
            app_title: "Botdeck".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub database_path: PathBuf,
    /// Directory holding uploaded file bytes
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("botdeck.db"),
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, falling back to defaults when the file is absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Apply environment overrides on top of the loaded config
    pub fn apply_env(mut self) -> Self {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(secret) = std::env::var("ADMIN_SECRET_KEY") {
            self.auth.admin_secret = secret;
        }
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            self.llm.api_key = key;
        }
        if let Ok(url) = std::env::var("OPENROUTER_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(url) = std::env::var("FRONTEND_URL") {
            self.llm.referer = url;
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.max_upload_size, 10 * 1024 * 1024);
        assert_eq!(config.auth.token_ttl_secs, 7 * 24 * 60 * 60);
        assert!(config.llm.api_key.is_empty());
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let config = AppConfig::load("/nonexistent/botdeck.toml").unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn toml_round_trip() {
        let config = AppConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.llm.base_url, config.llm.base_url);
    }
}
