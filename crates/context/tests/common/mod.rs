//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use docguard_common::audit::{AuditEvent, AuditLogger, AuditPayload, MemoryAuditSink};
use docguard_common::embeddings::{Embedder, HashingEmbedder};
use docguard_common::errors::{AppError, Result};
use docguard_common::{ConversationTurn, DocumentChunk, RetrievedPassage};
use docguard_context::{Assistant, LanguageModel, Prompt, QueryPipeline, Synthesizer, TopicGuard};
use docguard_ingestion::DocumentLoader;
use docguard_search::{Retriever, VectorStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const THRESHOLD: f32 = 0.30;

/// Replies with a fixed answer and records every prompt
pub struct ScriptedModel {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn histories(&self) -> Vec<Vec<ConversationTurn>> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.history.clone())
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err(message) => Err(AppError::SynthesisFailed {
                message: message.clone(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Answers only after a delay, to exercise cancellation
pub struct SlowModel {
    delay: Duration,
}

impl SlowModel {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay })
    }
}

#[async_trait]
impl LanguageModel for SlowModel {
    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("Too late (source: doc.pdf p.1)".to_string())
    }

    fn model_name(&self) -> &str {
        "slow"
    }
}

/// Counts calls and returns fixed passages
pub struct CountingRetriever {
    passages: Vec<RetrievedPassage>,
    calls: AtomicUsize,
}

impl CountingRetriever {
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self {
            passages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for CountingRetriever {
    async fn retrieve(&self, _query: &str, _threshold: f32) -> Result<Vec<RetrievedPassage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.passages.clone())
    }
}

/// Always fails like an unreachable index backend
pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _threshold: f32) -> Result<Vec<RetrievedPassage>> {
        Err(AppError::RetrievalFailed {
            message: "index backend unavailable".to_string(),
        })
    }
}

pub fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashingEmbedder::new(384))
}

pub fn pipeline(model: Arc<dyn LanguageModel>, sink: Arc<MemoryAuditSink>) -> QueryPipeline {
    QueryPipeline::new(
        TopicGuard::new().unwrap(),
        Synthesizer::new(model, Duration::from_secs(90)),
        AuditLogger::new(sink, "test-host"),
        THRESHOLD,
    )
}

pub fn assistant(
    model: Arc<dyn LanguageModel>,
    sink: Arc<MemoryAuditSink>,
    index_dir: Option<PathBuf>,
) -> Assistant {
    Assistant::new(
        pipeline(model, sink),
        DocumentLoader::default(),
        embedder(),
        3,
        index_dir,
    )
}

/// Knowledge base with the vaccine storage passage on page index 1
pub async fn vaccine_store() -> VectorStore {
    VectorStore::from_chunks(
        embedder(),
        3,
        vec![
            DocumentChunk {
                text: "Introduction to the immunization programme.".to_string(),
                source: "/srv/uploads/doc.pdf".to_string(),
                page: Some(0),
                start_index: 0,
            },
            DocumentChunk {
                text: "Vaccine storage temperature must be kept between 2 and 8 degrees Celsius."
                    .to_string(),
                source: "/srv/uploads/doc.pdf".to_string(),
                page: Some(1),
                start_index: 0,
            },
        ],
    )
    .await
    .unwrap()
}

pub fn passage(text: &str, source: &str, page: Option<u32>, score: f32) -> RetrievedPassage {
    RetrievedPassage {
        text: text.to_string(),
        source_id: source.to_string(),
        page_number: page,
        relevance_score: score,
    }
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Event type names in write order
pub fn event_types(events: &[AuditEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.payload.type_name()).collect()
}

pub fn query_payload(event: &AuditEvent) -> &docguard_common::audit::QueryRecord {
    match &event.payload {
        AuditPayload::Query(record) => record,
        other => panic!("expected query event, got {}", other.type_name()),
    }
}

pub fn response_payload(event: &AuditEvent) -> &docguard_common::audit::ResponseRecord {
    match &event.payload {
        AuditPayload::Response(record) => record,
        other => panic!("expected response event, got {}", other.type_name()),
    }
}
