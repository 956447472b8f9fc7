//! Relay WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::rtc::rtc_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoint
///
/// `GET /rtc?session_id=<id>` - WebSocket upgrade for one relay session.
/// Without `session_id` a fresh id is generated.
///
/// # Example
///
/// ```json
/// // Client sends a typed turn
/// {"type": "chat", "data": "Hello"}
///
/// // Server answers
/// {"type": "avatar_end"}
/// {"type": "chat", "message": "Hello", "id": "5f0c...", "role": "human"}
/// ```
pub fn create_rtc_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rtc", get(rtc_handler))
        .layer(TraceLayer::new_for_http())
}
