//! Error types for the platform

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Result type alias for platform operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level validation failure
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Platform errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request validation failure with field-level detail
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Missing or invalid bearer credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Resource missing, or owned by someone else (indistinguishable on purpose)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Email already registered
    #[error("Email already registered")]
    EmailTaken,

    /// Request is well-formed but not acceptable
    #[error("{0}")]
    BadRequest(String),

    /// Upload rejected by the MIME allow-list
    #[error("File type not allowed: {0}")]
    FileTypeNotAllowed(String),

    /// Upload over the size ceiling
    #[error("File exceeds the {0} byte upload limit")]
    FileTooLarge(usize),

    /// Upstream completion API error
    #[error("Completion API error: {0}")]
    Llm(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with a single field detail
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::Validation(details) => {
                let body = Json(json!({
                    "error": {
                        "type": "validation_error",
                        "message": "Validation failed",
                        "details": details,
                    }
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            Error::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", what),
            ),
            Error::EmailTaken => (
                StatusCode::BAD_REQUEST,
                "email_taken",
                self.to_string(),
            ),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Error::FileTypeNotAllowed(_) => {
                (StatusCode::BAD_REQUEST, "file_type_not_allowed", self.to_string())
            }
            Error::FileTooLarge(_) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "file_too_large", self.to_string())
            }
            Error::Llm(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "llm_error", msg.clone()),
            Error::Database(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", msg.clone())
            }
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (
                StatusCode::BAD_GATEWAY,
                "http_error",
                err.to_string(),
            ),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
