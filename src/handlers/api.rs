use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<String>,
    pub count: usize,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

/// Lists the ids of every registered session.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    let sessions = state.sessions.session_ids();
    Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    })
}

/// Explicit stop request for one session.
///
/// Shuts the session down and closes its relay connection.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    state.sessions.stop_session(&session_id).await?;
    info!(session_id = %session_id, "Session stopped by API request");
    Ok(StatusCode::NO_CONTENT)
}
