//! REST endpoint tests.

mod common;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

use avatar_relay::{ServerConfig, config::RelayConfig, routes, state::AppState};
use common::MockHandlerDelegate;

fn create_test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 3001,
        tls: None,
        cors_allowed_origins: Some("*".to_string()),
        relay: RelayConfig::default(),
    }
}

fn app(state: Arc<AppState>) -> Router {
    routes::api::create_api_router()
        .merge(routes::rtc::create_rtc_router())
        .with_state(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = app(AppState::new(create_test_config()));

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "OK");
}

#[tokio::test]
async fn test_list_sessions() {
    let handler = MockHandlerDelegate::new(1.0);
    let state = AppState::with_handler(create_test_config(), handler);
    state
        .sessions
        .create_session(Some("b".to_string()))
        .await
        .unwrap();
    state
        .sessions
        .create_session(Some("a".to_string()))
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/sessions")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["sessions"], serde_json::json!(["a", "b"]));
}

#[tokio::test]
async fn test_delete_session() {
    let handler = MockHandlerDelegate::new(1.0);
    let state = AppState::with_handler(create_test_config(), handler.clone());
    let session = state
        .sessions
        .create_session(Some("gone".to_string()))
        .await
        .unwrap();

    let request = Request::builder()
        .method("DELETE")
        .uri("/sessions/gone")
        .body(Body::empty())
        .unwrap();
    let response = app(state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(session.is_closed());
    assert_eq!(handler.stopped(), vec!["gone".to_string()]);

    let request = Request::builder()
        .method("DELETE")
        .uri("/sessions/gone")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "not_found");
}

#[tokio::test]
async fn test_rtc_endpoint_requires_upgrade() {
    let handler = MockHandlerDelegate::new(1.0);
    let state = AppState::with_handler(create_test_config(), handler.clone());

    let request = Request::builder()
        .uri("/rtc?session_id=plain")
        .body(Body::empty())
        .unwrap();
    let response = app(state.clone()).oneshot(request).await.unwrap();

    // Rejected by the upgrade extractor before any session exists
    assert!(response.status().is_client_error());
    assert!(state.sessions.is_empty());
    assert!(handler.started().is_empty());
}
