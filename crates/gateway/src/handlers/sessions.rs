//! Session management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use docguard_common::{errors::Result, ConversationTurn};
use docguard_context::Session;

/// Create session request
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Resume an earlier session, reloading its knowledge base snapshot
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Create session response
#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub resumed: bool,
    pub knowledge_base: KnowledgeBaseStatus,
}

/// Session state response
#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub history: Vec<ConversationTurn>,
    pub knowledge_base: KnowledgeBaseStatus,
}

#[derive(Serialize)]
pub struct KnowledgeBaseStatus {
    pub loaded: bool,
    pub chunks: usize,
    pub sources: Vec<String>,
}

impl KnowledgeBaseStatus {
    pub fn of(session: &Session) -> Self {
        Self {
            loaded: session.has_knowledge_base(),
            chunks: session.chunk_count(),
            sources: session
                .knowledge_base()
                .map(|kb| kb.sources())
                .unwrap_or_default(),
        }
    }
}

/// Create a new session, or resume one by id
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>)> {
    let (handle, resumed) = match request.session_id {
        Some(id) => {
            // A live session is handed back untouched
            let handle = match state.sessions.get(id).await {
                Ok(handle) => handle,
                Err(_) => {
                    let session = state.assistant.restore_session(id).await?;
                    state.sessions.insert(session).await
                }
            };
            (handle, true)
        }
        None => (state.sessions.insert(Session::new()).await, false),
    };

    let session = handle.lock().await;
    tracing::info!(
        session_id = %session.id(),
        resumed,
        chunks = session.chunk_count(),
        "Session created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id(),
            resumed,
            knowledge_base: KnowledgeBaseStatus::of(&session),
        }),
    ))
}

/// Get session history and knowledge base status
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let handle = state.sessions.get(session_id).await?;
    let session = handle.lock().await;

    Ok(Json(SessionResponse {
        session_id: session.id(),
        history: session.history().to_vec(),
        knowledge_base: KnowledgeBaseStatus::of(&session),
    }))
}

/// Forget a session; its knowledge base snapshot stays on disk for resuming
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions.remove(session_id).await?;
    tracing::info!(session_id = %session_id, "Session closed");
    Ok(StatusCode::NO_CONTENT)
}
