//! Query and conversation handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docguard_common::{
    errors::{AppError, Result},
    Citation, ConversationTurn, RefusalType,
};

/// Longest accepted question, in characters
pub const MAX_QUERY_LENGTH: usize = 4000;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    /// Blank questions are accepted and refused by the topic guard
    #[validate(length(max = 4000))]
    pub query: String,
}

/// Query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub grounded: bool,
    pub refusal_type: RefusalType,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session_id: Uuid,
    pub history: Vec<ConversationTurn>,
}

/// Ask a question within a session
pub async fn query(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let handle = state.sessions.get(session_id).await?;
    let mut session = handle.lock().await;
    let outcome = state.assistant.submit_query(&mut session, &request.query).await?;

    Ok(Json(QueryResponse {
        answer: outcome.answer,
        citations: outcome.citations,
        grounded: outcome.grounded,
        refusal_type: outcome.refusal_type,
    }))
}

/// Clear the conversation history
pub async fn reset(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ResetResponse>> {
    let handle = state.sessions.get(session_id).await?;
    let mut session = handle.lock().await;
    state.assistant.reset_conversation(&mut session);

    Ok(Json(ResetResponse {
        session_id,
        history: session.history().to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_length_limit() {
        let ok = QueryRequest {
            query: "What is vaccine storage temperature?".to_string(),
        };
        assert!(ok.validate().is_ok());

        let blank = QueryRequest { query: String::new() };
        assert!(blank.validate().is_ok());

        let long = QueryRequest {
            query: "a".repeat(MAX_QUERY_LENGTH + 1),
        };
        assert!(long.validate().is_err());
    }
}
