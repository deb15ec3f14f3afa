//! DocGuard Ingestion Library
//!
//! Loads PDF, text and markdown documents and splits them into
//! overlapping chunks for the vector index.

pub mod chunker;
pub mod errors;
pub mod loader;
pub mod pdf;

pub use chunker::{chunk_text, ChunkingConfig, TextChunk};
pub use errors::IngestionError;
pub use loader::DocumentLoader;
