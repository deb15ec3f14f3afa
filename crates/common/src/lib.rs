//! DocGuard Common Library
//!
//! Shared code for all DocGuard crates including:
//! - Error types and handling
//! - Configuration management
//! - Passage, citation and conversation models
//! - Embedding client abstraction
//! - Append-only audit log
//! - Metrics and observability

pub mod audit;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use audit::{AuditEvent, AuditSink, RefusalType};
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use models::{Citation, ConversationTurn, DocumentChunk, RetrievedPassage, Role};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model for the OpenAI-compatible provider
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension for the local hashing embedder
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Hard cap on passages handed to the synthesizer per query
pub const MAX_PASSAGES: usize = 3;
