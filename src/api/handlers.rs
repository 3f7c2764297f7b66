//! REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::types::{
    ErrorResponse, ListSessionsResponse, SessionStatusResponse, SimulateQuery, SimulateResponse,
};
use crate::channel::{ChannelKind, ChannelOptions};
use crate::error::IpcError;
use crate::gateway::{Gateway, Request, DEFAULT_REQUEST_TIMEOUT};
use crate::session::SessionRegistry;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_options(ChannelOptions::default())
    }

    /// Build state whose sessions allocate channels with `options`.
    pub fn with_options(options: ChannelOptions) -> Self {
        let registry = Arc::new(SessionRegistry::new(options));
        Self {
            gateway: Gateway::new(registry, DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.gateway.registry()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an error to its HTTP status.
pub fn status_for(err: &IpcError) -> StatusCode {
    match err {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        // Channel failures, capacity overflow included
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: IpcError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::warn!(code = err.code(), error = %err, "request failed");
    }
    (status, Json(ErrorResponse::from_error(&err)))
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// Welcome document with usage hints.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "ipc-sim",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Welcome to the IPC Simulation API",
        "instructions": "Use /simulate/{kind}/{action} to perform IPC operations",
        "examples": [
            "/simulate/shared_memory/init",
            "/simulate/shared_memory/write?message=Hello",
            "/simulate/shared_memory/read",
            "/simulate/shared_memory/cleanup"
        ],
        "kinds": ChannelKind::ALL,
        "actions": ["init", "write", "read", "cleanup"]
    }))
}

/// Status of every session.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let snapshots = state.registry().snapshots().map_err(api_error)?;
    let sessions: Vec<_> = snapshots
        .iter()
        .map(SessionStatusResponse::from_snapshot)
        .collect();

    Ok(Json(ListSessionsResponse {
        count: sessions.len(),
        sessions,
    }))
}

/// Status of one session.
pub async fn session_status(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let kind: ChannelKind = kind.parse().map_err(api_error)?;
    let snapshot = state.registry().get(kind).snapshot().map_err(api_error)?;
    Ok(Json(SessionStatusResponse::from_snapshot(&snapshot)))
}

/// Run one lifecycle action against a session.
pub async fn simulate(
    State(state): State<AppState>,
    Path((kind, action)): Path<(String, String)>,
    Query(query): Query<SimulateQuery>,
) -> Result<Json<SimulateResponse>, ApiError> {
    let request = Request::parse(&kind, &action, query.message).map_err(api_error)?;
    let action = request.action;

    let outcome = state.gateway.handle(request).await.map_err(|e| {
        let (status, Json(body)) = api_error(e);
        (status, Json(body.with_action(action)))
    })?;

    Ok(Json(SimulateResponse::from_outcome(action, &outcome)))
}
