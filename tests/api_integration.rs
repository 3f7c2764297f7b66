//! API integration tests.
//!
//! These tests verify the complete API flow end-to-end using axum's test utilities.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use ipc_sim::api::{create_router, create_router_with_state, AppState};
use ipc_sim::ChannelOptions;
use tower::ServiceExt;

/// Helper to create a request.
fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Helper to extract body as string.
async fn response_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

/// Helper to extract JSON from response.
async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Router whose pipe reads give up quickly.
fn app() -> Router {
    let options = ChannelOptions::default().with_read_timeout(Duration::from_millis(100));
    create_router_with_state(AppState::with_options(options))
}

/// Send a GET and return status plus JSON body.
async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request(Method::GET, uri))
        .await
        .unwrap();
    let status = response.status();
    (status, response_json(response).await)
}

// ============================================================================
// Health & Info Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router();

    let response = app.oneshot(request(Method::GET, "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "OK");
}

#[tokio::test]
async fn test_api_info_endpoint() {
    let (status, json) = get(&app(), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "ipc-sim");
    assert!(json["examples"].is_array());
}

// ============================================================================
// Shared Memory Lifecycle
// ============================================================================

#[tokio::test]
async fn test_shared_memory_end_to_end() {
    let app = app();

    let (status, json) = get(&app, "/simulate/shared_memory/init").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");

    let (status, json) = get(&app, "/simulate/shared_memory/write?message=Hi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Hi");

    // Non-destructive: same content twice
    for _ in 0..2 {
        let (status, json) = get(&app, "/simulate/shared_memory/read").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Hi");
    }

    let (status, _) = get(&app, "/simulate/shared_memory/cleanup").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = get(&app, "/simulate/shared_memory/read").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NOT_INITIALIZED");
    assert_eq!(json["action"], "read");
}

#[tokio::test]
async fn test_double_init() {
    let app = app();

    let (status, _) = get(&app, "/simulate/shared_memory/init").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = get(&app, "/simulate/shared_memory/init").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "ALREADY_INITIALIZED");
}

#[tokio::test]
async fn test_write_before_init() {
    let (status, json) = get(&app(), "/simulate/pipe/write?message=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NOT_INITIALIZED");
}

#[tokio::test]
async fn test_write_missing_message() {
    let app = app();
    get(&app, "/simulate/shared_memory/init").await;

    let (status, json) = get(&app, "/simulate/shared_memory/write").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MISSING_PAYLOAD");

    let (status, _) = get(&app, "/simulate/shared_memory/write?message=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_write_payload_too_large() {
    let options = ChannelOptions::default().with_shm_capacity(4);
    let app = create_router_with_state(AppState::with_options(options));
    get(&app, "/simulate/shared_memory/init").await;

    let (status, json) = get(&app, "/simulate/shared_memory/write?message=toolong").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(json["action"], "write");
}

#[tokio::test]
async fn test_url_encoded_message() {
    let app = app();
    get(&app, "/simulate/shared_memory/init").await;

    let (status, json) =
        get(&app, "/simulate/shared_memory/write?message=Hello%20World").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Hello World");

    let (_, json) = get(&app, "/simulate/shared_memory/read").await;
    assert_eq!(json["message"], "Hello World");
}

// ============================================================================
// Pipe Lifecycle
// ============================================================================

#[tokio::test]
async fn test_pipe_read_is_destructive() {
    let app = app();

    get(&app, "/simulate/pipe/init").await;
    let (status, _) = get(&app, "/simulate/pipe/write?message=x").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = get(&app, "/simulate/pipe/read").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "x");

    let (status, json) = get(&app, "/simulate/pipe/read").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "TIMEOUT");
}

#[tokio::test]
async fn test_cleanup_always_succeeds() {
    let app = app();

    for _ in 0..2 {
        let (status, json) = get(&app, "/simulate/pipe/cleanup").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
    }
}

// ============================================================================
// Status Endpoints
// ============================================================================

#[tokio::test]
async fn test_list_sessions() {
    let app = app();
    get(&app, "/simulate/shared_memory/init").await;
    get(&app, "/simulate/shared_memory/write?message=hello").await;

    let (status, json) = get(&app, "/simulate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["sessions"][0]["kind"], "shared_memory");
    assert_eq!(json["sessions"][0]["state"], "message_written");
    assert_eq!(json["sessions"][0]["last_message"], "hello");
    assert_eq!(json["sessions"][1]["kind"], "pipe");
    assert_eq!(json["sessions"][1]["state"], "uninitialized");
}

#[tokio::test]
async fn test_session_status() {
    let app = app();
    get(&app, "/simulate/pipe/init").await;

    let (status, json) = get(&app, "/simulate/pipe/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "pipe");
    assert_eq!(json["state"], "initialized");
    assert_eq!(json["capacity"], "unbounded");
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_kind() {
    let (status, json) = get(&app(), "/simulate/message_queue/init").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_ACTION");

    let (status, _) = get(&app(), "/simulate/message_queue/status").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_action() {
    let (status, json) = get(&app(), "/simulate/pipe/delete").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_ACTION");
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_method_not_allowed() {
    let response = app()
        .oneshot(request(Method::POST, "/simulate/pipe/init"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_not_found_route() {
    let response = app()
        .oneshot(request(Method::GET, "/nonexistent"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
