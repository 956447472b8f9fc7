use axum::{
    Router,
    routing::{delete, get},
};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST router
///
/// # Endpoints
///
/// - `GET /` - Health check
/// - `GET /sessions` - Registered session ids
/// - `DELETE /sessions/{session_id}` - Stop one session
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/sessions", get(api::list_sessions))
        .route("/sessions/{session_id}", delete(api::delete_session))
        .layer(TraceLayer::new_for_http())
}
