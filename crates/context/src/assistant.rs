//! Session surface
//!
//! `Assistant` wires the pipeline to document ingestion and knowledge base
//! persistence. It holds no per-user state: every operation takes the
//! `Session` it acts on.

use crate::guard::TopicGuard;
use crate::llm::create_language_model;
use crate::pipeline::{QueryOutcome, QueryPipeline};
use crate::session::Session;
use crate::synthesizer::Synthesizer;
use docguard_common::audit::AuditLogger;
use docguard_common::config::AppConfig;
use docguard_common::embeddings::{create_embedder, Embedder};
use docguard_common::errors::{AppError, Result};
use docguard_common::{metrics, DocumentChunk};
use docguard_ingestion::DocumentLoader;
use docguard_search::{remove_snapshot, Retriever, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Text supplied directly instead of as a file
#[derive(Debug, Clone)]
pub struct InlineDocument {
    /// Name used as the chunk source
    pub name: String,
    pub text: String,
}

pub struct Assistant {
    pipeline: QueryPipeline,
    loader: DocumentLoader,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    index_dir: Option<PathBuf>,
}

impl Assistant {
    pub fn new(
        pipeline: QueryPipeline,
        loader: DocumentLoader,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        index_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            loader,
            embedder,
            top_k,
            index_dir,
        }
    }

    /// Build all collaborators from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let model = create_language_model(&config.llm)?;
        let synthesizer = Synthesizer::new(model, config.llm_timeout());
        let audit = AuditLogger::from_config(&config.audit)?;
        let pipeline = QueryPipeline::new(
            TopicGuard::new()?,
            synthesizer,
            audit,
            config.retrieval.score_threshold,
        );

        Ok(Self::new(
            pipeline,
            DocumentLoader::from_config(&config.ingestion),
            create_embedder(&config.embedding)?,
            config.top_k(),
            config.index_dir(),
        ))
    }

    pub fn model_name(&self) -> &str {
        self.pipeline.model_name()
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    /// Answer a query and append the exchange to the session history
    #[instrument(skip(self, session, query), fields(session_id = %session.id()))]
    pub async fn submit_query(&self, session: &mut Session, query: &str) -> Result<QueryOutcome> {
        let knowledge_base = session.knowledge_base.as_ref().map(|kb| kb as &dyn Retriever);
        let outcome = self
            .pipeline
            .run(query, knowledge_base, &session.history)
            .await?;

        session.record_exchange(query, &outcome.answer);
        Ok(outcome)
    }

    /// Clear the conversation history; idempotent
    pub fn reset_conversation(&self, session: &mut Session) {
        session.reset();
        info!(session_id = %session.id(), "Conversation reset");
    }

    /// Load, chunk and index files, returning the number of chunks created
    #[instrument(skip(self, session, paths), fields(session_id = %session.id(), files = paths.len()))]
    pub async fn ingest_documents(&self, session: &mut Session, paths: &[PathBuf]) -> Result<usize> {
        let loader = self.loader.clone();
        let files = paths.to_vec();

        // PDF parsing is CPU-bound
        let chunks = tokio::task::spawn_blocking(move || -> Result<Vec<DocumentChunk>> {
            let mut chunks = Vec::new();
            for path in &files {
                chunks.extend(loader.load_and_split(path)?);
            }
            Ok(chunks)
        })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Document loading task failed: {}", e),
        })??;

        self.index_chunks(session, chunks, paths.len()).await
    }

    /// Chunk and index text supplied inline
    #[instrument(skip(self, session, documents), fields(session_id = %session.id(), documents = documents.len()))]
    pub async fn ingest_inline(
        &self,
        session: &mut Session,
        documents: &[InlineDocument],
    ) -> Result<usize> {
        let mut chunks = Vec::new();
        for document in documents {
            chunks.extend(self.loader.split_text(&document.text, &document.name, None)?);
        }

        self.index_chunks(session, chunks, documents.len()).await
    }

    async fn index_chunks(
        &self,
        session: &mut Session,
        chunks: Vec<DocumentChunk>,
        documents: usize,
    ) -> Result<usize> {
        if chunks.is_empty() {
            warn!("No content extracted, knowledge base unchanged");
            return Ok(0);
        }

        let start = Instant::now();
        let count = chunks.len();
        match session.knowledge_base.as_mut() {
            Some(store) => {
                store.add_chunks(chunks).await?;
            }
            None => {
                let store =
                    VectorStore::from_chunks(self.embedder.clone(), self.top_k, chunks).await?;
                session.knowledge_base = Some(store);
            }
        }
        metrics::record_ingestion(start.elapsed().as_secs_f64(), documents, count);

        let snapshot_dir = self.session_dir(session.id());
        if let (Some(dir), Some(store)) = (snapshot_dir, session.knowledge_base.as_ref()) {
            // The in-memory store stays usable when the snapshot cannot be written
            if let Err(e) = store.save(&dir).await {
                warn!(error = %e, "Failed to persist knowledge base snapshot");
            }
        }

        info!(chunks = count, total = session.chunk_count(), "Documents ingested");
        Ok(count)
    }

    /// Drop the session's knowledge base and its snapshot
    pub async fn clear_knowledge_base(&self, session: &mut Session) -> Result<()> {
        session.knowledge_base = None;
        if let Some(dir) = self.session_dir(session.id()) {
            remove_snapshot(&dir).await?;
        }
        info!(session_id = %session.id(), "Knowledge base cleared");
        Ok(())
    }

    /// Recreate a session, reloading its knowledge base snapshot if one exists
    pub async fn restore_session(&self, id: Uuid) -> Result<Session> {
        let mut session = Session::with_id(id);
        if let Some(dir) = self.session_dir(id) {
            session.knowledge_base =
                VectorStore::load(&dir, self.embedder.clone(), self.top_k).await?;
        }
        info!(session_id = %id, chunks = session.chunk_count(), "Session restored");
        Ok(session)
    }

    /// Snapshot directory for a session, when persistence is enabled
    fn session_dir(&self, id: Uuid) -> Option<PathBuf> {
        self.index_dir.as_deref().map(|dir: &Path| dir.join(id.to_string()))
    }
}
