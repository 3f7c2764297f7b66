//! Operation gateway.
//!
//! Turns an external `(kind, action, payload)` request into a call on the
//! matching session. Session operations may block on the OS (a pipe read waits
//! up to its timeout), so they run on the blocking thread pool and are bounded
//! by a request timeout.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::channel::ChannelKind;
use crate::error::IpcError;
use crate::session::{Action, SessionRegistry};
use crate::Result;

/// Default budget for one request, including time spent waiting for the
/// session lock.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub kind: ChannelKind,
    pub action: Action,
    pub payload: Option<String>,
}

impl Request {
    /// Parse raw path segments and query payload.
    ///
    /// Unknown kinds and actions fail with `InvalidAction`; a `write` without
    /// a non-empty payload fails with `MissingPayload`.
    pub fn parse(kind: &str, action: &str, payload: Option<String>) -> Result<Self> {
        let kind: ChannelKind = kind.parse()?;
        let action: Action = action.parse()?;

        if action == Action::Write && payload.as_deref().map_or(true, str::is_empty) {
            return Err(IpcError::MissingPayload);
        }

        Ok(Self {
            kind,
            action,
            payload,
        })
    }
}

/// Successful result of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Initialized(ChannelKind),
    /// Echo of the payload written.
    Written(ChannelKind, String),
    /// Channel content, decoded lossily as UTF-8.
    Read(ChannelKind, String),
    CleanedUp(ChannelKind),
}

impl Outcome {
    /// Caller-facing message text.
    pub fn message(&self) -> String {
        match self {
            Self::Initialized(kind) => format!("{} initialized", kind.label()),
            Self::Written(_, text) | Self::Read(_, text) => text.clone(),
            Self::CleanedUp(kind) => format!("{} cleaned up", kind.label()),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Initialized(kind)
            | Self::Written(kind, _)
            | Self::Read(kind, _)
            | Self::CleanedUp(kind) => *kind,
        }
    }
}

/// Dispatches requests to the session registry.
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<SessionRegistry>,
    request_timeout: Duration,
}

impl Gateway {
    pub fn new(registry: Arc<SessionRegistry>, request_timeout: Duration) -> Self {
        Self {
            registry,
            request_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Execute a request.
    ///
    /// If the request timeout fires, the caller gets `Timeout` but the
    /// session operation still runs to completion, and the session reflects
    /// whatever the OS call actually did.
    pub async fn handle(&self, request: Request) -> Result<Outcome> {
        let registry = Arc::clone(&self.registry);
        let kind = request.kind;
        let action = request.action;
        let task = tokio::task::spawn_blocking(move || dispatch(&registry, request));

        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(%kind, %action, error = %e, "session task failed");
                Err(IpcError::Internal("session task failed".into()))
            }
            Err(_) => {
                warn!(%kind, %action, "request timed out; operation continues in background");
                Err(IpcError::Timeout)
            }
        }
    }

    /// Execute a request on the current thread.
    pub fn handle_blocking(&self, request: Request) -> Result<Outcome> {
        dispatch(&self.registry, request)
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(Arc::new(SessionRegistry::default()), DEFAULT_REQUEST_TIMEOUT)
    }
}

fn dispatch(registry: &SessionRegistry, request: Request) -> Result<Outcome> {
    let session = registry.get(request.kind);
    let kind = request.kind;

    match request.action {
        Action::Init => session.init().map(|_| Outcome::Initialized(kind)),
        Action::Write => {
            let payload = request.payload.ok_or(IpcError::MissingPayload)?;
            session.write(payload.as_bytes())?;
            Ok(Outcome::Written(kind, payload))
        }
        Action::Read => {
            let data = session.read()?;
            Ok(Outcome::Read(kind, String::from_utf8_lossy(&data).into_owned()))
        }
        Action::Cleanup => session.cleanup().map(|_| Outcome::CleanedUp(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelOptions;

    fn gateway() -> Gateway {
        let options = ChannelOptions::default().with_read_timeout(Duration::from_millis(50));
        Gateway::new(
            Arc::new(SessionRegistry::new(options)),
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    fn req(kind: &str, action: &str, payload: Option<&str>) -> Request {
        Request::parse(kind, action, payload.map(String::from)).unwrap()
    }

    #[test]
    fn test_parse_valid() {
        let r = req("pipe", "write", Some("hi"));
        assert_eq!(r.kind, ChannelKind::Pipe);
        assert_eq!(r.action, Action::Write);
        assert_eq!(r.payload.as_deref(), Some("hi"));
    }

    #[test]
    fn test_parse_invalid_action() {
        let err = Request::parse("pipe", "delete", None).unwrap_err();
        assert!(matches!(err, IpcError::InvalidAction(_)));
    }

    #[test]
    fn test_parse_invalid_kind() {
        let err = Request::parse("semaphore", "init", None).unwrap_err();
        assert!(matches!(err, IpcError::InvalidAction(_)));
    }

    #[test]
    fn test_parse_missing_payload() {
        assert!(matches!(
            Request::parse("shared_memory", "write", None),
            Err(IpcError::MissingPayload)
        ));
        assert!(matches!(
            Request::parse("shared_memory", "write", Some(String::new())),
            Err(IpcError::MissingPayload)
        ));
        // Payload is ignored for other actions
        assert!(Request::parse("shared_memory", "read", Some("x".into())).is_ok());
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            Outcome::Initialized(ChannelKind::SharedMemory).message(),
            "Shared memory initialized"
        );
        assert_eq!(
            Outcome::CleanedUp(ChannelKind::Pipe).message(),
            "Pipe cleaned up"
        );
        assert_eq!(
            Outcome::Written(ChannelKind::Pipe, "Hello".into()).message(),
            "Hello"
        );
    }

    #[tokio::test]
    async fn test_shared_memory_scenario() {
        let gw = gateway();

        gw.handle(req("shared_memory", "init", None)).await.unwrap();
        let out = gw
            .handle(req("shared_memory", "write", Some("Hi")))
            .await
            .unwrap();
        assert_eq!(out, Outcome::Written(ChannelKind::SharedMemory, "Hi".into()));

        let out = gw.handle(req("shared_memory", "read", None)).await.unwrap();
        assert_eq!(out, Outcome::Read(ChannelKind::SharedMemory, "Hi".into()));

        gw.handle(req("shared_memory", "cleanup", None))
            .await
            .unwrap();
        let err = gw
            .handle(req("shared_memory", "read", None))
            .await
            .unwrap_err();
        assert!(matches!(err, IpcError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_pipe_read_timeout_surfaces() {
        let gw = gateway();
        gw.handle(req("pipe", "init", None)).await.unwrap();

        let err = gw.handle(req("pipe", "read", None)).await.unwrap_err();
        assert!(matches!(err, IpcError::Timeout));
    }

    #[tokio::test]
    async fn test_request_timeout_keeps_session_consistent() {
        let options = ChannelOptions::default().with_read_timeout(Duration::from_millis(300));
        let registry = Arc::new(SessionRegistry::new(options));
        let gw = Gateway::new(Arc::clone(&registry), Duration::from_millis(20));

        gw.handle_blocking(req("pipe", "init", None)).unwrap();

        // Gateway gives up before the pipe read does
        let err = gw.handle(req("pipe", "read", None)).await.unwrap_err();
        assert!(matches!(err, IpcError::Timeout));

        // Session is still initialized once the read finishes on its own
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            registry.get(ChannelKind::Pipe).state().unwrap(),
            crate::session::SessionState::Initialized
        );
    }

    #[test]
    fn test_handle_blocking() {
        let gw = gateway();
        assert_eq!(
            gw.handle_blocking(req("pipe", "cleanup", None)).unwrap(),
            Outcome::CleanedUp(ChannelKind::Pipe)
        );
    }
}
