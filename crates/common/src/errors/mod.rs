//! Error types for DocGuard services
//!
//! One `AppError` enum is shared by every crate. Each variant maps to a
//! stable `ErrorCode` and an HTTP status so the gateway can render it
//! directly.
//!
//! Guardrail refusals (topic blocks, missing knowledge base, ungrounded
//! answers) are not errors; they are ordinary outcomes of the pipeline.
//! Only infrastructure failures and bad requests surface here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    UnsupportedDocument,

    // Resource errors (4xxx)
    SessionNotFound,
    DocumentNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamError,
    RetrievalFailed,
    SynthesisFailed,
    SynthesisTimeout,
    EmbeddingError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    IngestionError,
    IndexPersistenceError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::UnsupportedDocument => 1005,

            // Resources (4xxx)
            ErrorCode::SessionNotFound => 4005,
            ErrorCode::DocumentNotFound => 4006,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::RetrievalFailed => 8010,
            ErrorCode::SynthesisFailed => 8011,
            ErrorCode::SynthesisTimeout => 8012,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::IngestionError => 9004,
            ErrorCode::IndexPersistenceError => 9005,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Unsupported document type: {path}")]
    UnsupportedDocument { path: String },

    // Resource errors
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Document not found: {path}")]
    DocumentNotFound { path: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("Retrieval failed: {message}")]
    RetrievalFailed { message: String },

    #[error("Answer synthesis failed: {message}")]
    SynthesisFailed { message: String },

    #[error("Answer synthesis timed out after {timeout_secs}s")]
    SynthesisTimeout { timeout_secs: u64 },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Ingestion error: {message}")]
    Ingestion { message: String },

    #[error("Index persistence error: {message}")]
    IndexPersistence { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::UnsupportedDocument { .. } => ErrorCode::UnsupportedDocument,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::RetrievalFailed { .. } => ErrorCode::RetrievalFailed,
            AppError::SynthesisFailed { .. } => ErrorCode::SynthesisFailed,
            AppError::SynthesisTimeout { .. } => ErrorCode::SynthesisTimeout,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Ingestion { .. } => ErrorCode::IngestionError,
            AppError::IndexPersistence { .. } => ErrorCode::IndexPersistenceError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::UnsupportedDocument { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::SessionNotFound { .. }
            | AppError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Ingestion { .. }
            | AppError::IndexPersistence { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::RetrievalFailed { .. }
            | AppError::SynthesisFailed { .. }
            | AppError::EmbeddingError { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::SynthesisTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Failures of an external collaborator (index, embedder, LLM).
    /// These propagate per query and are never retried by the core.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::RetrievalFailed { .. }
                | AppError::SynthesisFailed { .. }
                | AppError::SynthesisTimeout { .. }
                | AppError::EmbeddingError { .. }
                | AppError::HttpClient(_)
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
