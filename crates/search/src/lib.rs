//! DocGuard Search Library
//!
//! Per-session vector store, the retrieval contract shared by all
//! retrievers, and JSON snapshots of a knowledge base.

pub mod retrieval;
pub mod snapshot;

pub use retrieval::{apply_contract, Retriever, VectorStore};
pub use snapshot::{remove_snapshot, snapshot_path};
