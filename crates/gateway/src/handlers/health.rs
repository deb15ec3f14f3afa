//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub llm: CheckResult,
    pub embedding: CheckResult,
    pub sessions: SessionCheck,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub model: String,
}

#[derive(Serialize)]
pub struct SessionCheck {
    pub active: usize,
    pub persistence: bool,
}

/// Liveness check - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: docguard_common::VERSION.to_string(),
    })
}

/// Readiness check - reports the configured models and live sessions
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let active = state.sessions.len().await;

    Json(ReadyResponse {
        status: "ready".to_string(),
        checks: ReadyChecks {
            llm: CheckResult {
                status: "up".to_string(),
                model: state.assistant.model_name().to_string(),
            },
            embedding: CheckResult {
                status: "up".to_string(),
                model: state.assistant.embedding_model().to_string(),
            },
            sessions: SessionCheck {
                active,
                persistence: state.config.index_dir().is_some(),
            },
        },
    })
}
