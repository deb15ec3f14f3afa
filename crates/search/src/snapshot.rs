//! On-disk index snapshots
//!
//! A knowledge base is persisted as a single JSON document under the
//! configured index directory. Snapshots record which embedding model
//! produced the vectors; loading with a different model is refused since
//! query and chunk vectors would not be comparable.

use crate::retrieval::{IndexedChunk, VectorStore};
use docguard_common::embeddings::Embedder;
use docguard_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot file name within a knowledge base directory
pub const SNAPSHOT_FILE: &str = "index.json";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexedChunk>,
}

fn persistence_error(path: &Path, action: &str, e: impl std::fmt::Display) -> AppError {
    AppError::IndexPersistence {
        message: format!("Failed to {} {}: {}", action, path.display(), e),
    }
}

/// Path of the snapshot file inside `dir`
pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

impl VectorStore {
    /// Write the store to `dir`, replacing any previous snapshot
    pub async fn save(&self, dir: &Path) -> Result<()> {
        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            embedding_model: self.embedder().model_name().to_string(),
            dimension: self.embedder().dimension(),
            entries: self.entries().to_vec(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| persistence_error(dir, "create", e))?;

        // Write then rename so a crash never leaves a truncated snapshot
        let path = snapshot_path(dir);
        let tmp = dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| persistence_error(&tmp, "write", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| persistence_error(&path, "replace", e))?;

        info!(path = %path.display(), chunks = self.len(), "Index snapshot saved");
        Ok(())
    }

    /// Load a snapshot from `dir`; `Ok(None)` when none exists
    pub async fn load(
        dir: &Path,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
    ) -> Result<Option<Self>> {
        let path = snapshot_path(dir);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No index snapshot");
                return Ok(None);
            }
            Err(e) => return Err(persistence_error(&path, "read", e)),
        };

        let snapshot: IndexSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| persistence_error(&path, "parse", e))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AppError::IndexPersistence {
                message: format!("Unsupported snapshot version {}", snapshot.version),
            });
        }

        if snapshot.embedding_model != embedder.model_name()
            || snapshot.dimension != embedder.dimension()
        {
            return Err(AppError::IndexPersistence {
                message: format!(
                    "Snapshot was built with {} ({} dims), current embedder is {} ({} dims)",
                    snapshot.embedding_model,
                    snapshot.dimension,
                    embedder.model_name(),
                    embedder.dimension()
                ),
            });
        }

        let store = Self::from_entries(embedder, top_k, snapshot.entries);
        info!(path = %path.display(), chunks = store.len(), "Index snapshot loaded");
        Ok(Some(store))
    }
}

/// Delete the snapshot directory, if present
pub async fn remove_snapshot(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            info!(path = %dir.display(), "Index snapshot removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persistence_error(dir, "remove", e)),
    }
}
