//! In-memory vector store
//!
//! Holds embedded chunks for a single knowledge base and answers similarity
//! queries by brute-force cosine scoring. Chunks are keyed by a content hash
//! so re-ingesting the same file replaces rather than duplicates entries.

use super::{apply_contract, Retriever};
use docguard_common::embeddings::{cosine_similarity, Embedder};
use docguard_common::errors::{AppError, Result};
use docguard_common::{DocumentChunk, RetrievedPassage, MAX_PASSAGES};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A chunk together with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Content hash of the chunk
    pub id: String,
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// Vector store over one session's documents
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    entries: Vec<IndexedChunk>,
    positions: HashMap<String, usize>,
}

impl VectorStore {
    /// Create an empty store
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            embedder,
            top_k: top_k.clamp(1, MAX_PASSAGES),
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Create a store and index the given chunks
    pub async fn from_chunks(
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Self> {
        let mut store = Self::new(embedder, top_k);
        store.add_chunks(chunks).await?;
        Ok(store)
    }

    /// Rebuild a store from already-embedded entries
    pub(crate) fn from_entries(
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        entries: Vec<IndexedChunk>,
    ) -> Self {
        let mut store = Self::new(embedder, top_k);
        for entry in entries {
            store.upsert(entry);
        }
        store
    }

    /// Embed and upsert chunks, returning how many were indexed
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn add_chunks(&mut self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "Expected {} embeddings, received {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }

        let count = chunks.len();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            self.upsert(IndexedChunk {
                id: chunk_id(&chunk),
                chunk,
                embedding,
            });
        }

        debug!(indexed = count, total = self.entries.len(), "Chunks indexed");
        Ok(count)
    }

    fn upsert(&mut self, entry: IndexedChunk) {
        match self.positions.get(&entry.id) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.positions.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Distinct source paths in ingestion order
    pub fn sources(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.chunk.source) {
                seen.push(entry.chunk.source.clone());
            }
        }
        seen
    }
}

#[async_trait::async_trait]
impl Retriever for VectorStore {
    async fn retrieve(&self, query: &str, score_threshold: f32) -> Result<Vec<RetrievedPassage>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await.map_err(|e| {
            AppError::RetrievalFailed {
                message: format!("Failed to embed query: {}", e),
            }
        })?;

        let candidates = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score = cosine_similarity(&query_embedding, &entry.embedding);
                (score >= score_threshold).then(|| RetrievedPassage::from_chunk(&entry.chunk, score))
            })
            .collect();

        Ok(apply_contract(candidates, score_threshold, self.top_k))
    }
}

/// Stable id derived from a chunk's origin and text
pub fn chunk_id(chunk: &DocumentChunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.source.as_bytes());
    hasher.update([0u8]);
    hasher.update(chunk.page.map(|p| p.to_string()).unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(chunk.start_index.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(chunk.text.as_bytes());
    hex::encode(hasher.finalize())
}
