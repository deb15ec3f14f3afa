//! Knowledge base handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docguard_common::errors::{AppError, Result};
use docguard_context::InlineDocument;

/// Ingest request: server-local files and/or inline text
#[derive(Debug, Deserialize, Validate)]
pub struct IngestRequest {
    #[serde(default)]
    #[validate(length(max = 50))]
    pub paths: Vec<String>,

    #[serde(default)]
    #[validate(length(max = 50), nested)]
    pub documents: Vec<InlineDocumentRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InlineDocumentRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub text: String,
}

/// Ingest response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Chunks created by this request
    pub chunks: usize,
    /// Chunks in the knowledge base afterwards
    pub total_chunks: usize,
}

/// Load documents into the session's knowledge base
pub async fn ingest(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    if request.paths.is_empty() && request.documents.is_empty() {
        return Err(AppError::MissingField {
            field: "paths or documents".to_string(),
        });
    }

    let handle = state.sessions.get(session_id).await?;
    let mut session = handle.lock().await;

    let mut chunks = 0;
    if !request.paths.is_empty() {
        let paths: Vec<PathBuf> = request.paths.iter().map(PathBuf::from).collect();
        chunks += state.assistant.ingest_documents(&mut session, &paths).await?;
    }

    if !request.documents.is_empty() {
        let documents: Vec<InlineDocument> = request
            .documents
            .into_iter()
            .map(|doc| InlineDocument {
                name: doc.name,
                text: doc.text,
            })
            .collect();
        chunks += state.assistant.ingest_inline(&mut session, &documents).await?;
    }

    Ok(Json(IngestResponse {
        chunks,
        total_chunks: session.chunk_count(),
    }))
}

/// Drop the session's knowledge base and its snapshot
pub async fn clear_knowledge_base(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    let handle = state.sessions.get(session_id).await?;
    let mut session = handle.lock().await;
    state.assistant.clear_knowledge_base(&mut session).await?;
    Ok(StatusCode::NO_CONTENT)
}
