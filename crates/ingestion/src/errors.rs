//! Ingestion error types

use docguard_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("File is not valid UTF-8 text: {0}")]
    InvalidEncoding(String),

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Path is outside the upload directory: {0}")]
    OutsideUploadRoot(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::UnsupportedFile(path) => AppError::UnsupportedDocument { path },
            IngestionError::FileNotFound(path) => AppError::DocumentNotFound { path },
            IngestionError::OutsideUploadRoot(path) => AppError::Validation {
                message: format!("Path is outside the upload directory: {}", path),
                field: Some("paths".to_string()),
            },
            other => AppError::Ingestion {
                message: other.to_string(),
            },
        }
    }
}
