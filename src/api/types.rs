//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::channel::{Capacity, ChannelKind};
use crate::error::IpcError;
use crate::gateway::Outcome;
use crate::session::{Action, SessionSnapshot, SessionState};

/// Query string of a simulate request.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SimulateQuery {
    /// Payload for `write`.
    #[serde(default)]
    pub message: Option<String>,
}

/// Response for a successful simulate request.
#[derive(Debug, Clone, Serialize)]
pub struct SimulateResponse {
    /// Always `"success"`.
    pub status: &'static str,
    pub kind: ChannelKind,
    pub action: Action,
    /// Echoed payload for `write`, channel content for `read`, a short
    /// description otherwise.
    pub message: String,
}

impl SimulateResponse {
    pub fn from_outcome(action: Action, outcome: &Outcome) -> Self {
        Self {
            status: "success",
            kind: outcome.kind(),
            action,
            message: outcome.message(),
        }
    }
}

/// Status of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusResponse {
    pub kind: ChannelKind,
    pub state: SessionState,
    /// Capacity of the live channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Capacity>,
    /// Last message written, decoded lossily.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub operations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_seconds: Option<f64>,
}

impl SessionStatusResponse {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            kind: snapshot.kind,
            state: snapshot.state,
            capacity: snapshot.capacity,
            last_message: snapshot
                .last_message
                .as_deref()
                .map(|m| String::from_utf8_lossy(m).into_owned()),
            operations: snapshot.operations,
            idle_seconds: snapshot.idle.map(|d| d.as_secs_f64()),
        }
    }
}

/// List sessions response.
#[derive(Debug, Clone, Serialize)]
pub struct ListSessionsResponse {
    pub count: usize,
    pub sessions: Vec<SessionStatusResponse>,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Always `"error"`.
    pub status: &'static str,
    /// Error code (e.g., "NOT_INITIALIZED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Operation that failed, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            code: code.into(),
            message: message.into(),
            action: None,
        }
    }

    /// Build the caller-facing form of an error.
    ///
    /// Internal failures are reduced to a generic message.
    pub fn from_error(err: &IpcError) -> Self {
        match err {
            IpcError::Internal(_) | IpcError::Io(_) | IpcError::AlreadyDestroyed => {
                Self::internal_error("internal failure")
            }
            other => Self::new(other.code(), other.to_string()),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
