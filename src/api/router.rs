//! API router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{api_info, health, list_sessions, session_status, simulate, AppState};
use crate::channel::ChannelOptions;
use crate::gateway::{Gateway, DEFAULT_REQUEST_TIMEOUT};
use crate::session::SessionRegistry;

/// Create the API router with all routes configured.
pub fn create_router() -> Router {
    create_router_with_state(AppState::new())
}

/// Create the API router with custom state.
pub fn create_router_with_state(state: AppState) -> Router {
    let simulate_routes = Router::new()
        .route("/", get(list_sessions))
        .route("/{kind}/status", get(session_status))
        .route("/{kind}/{action}", get(simulate));

    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health))
        .nest("/simulate", simulate_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Channel allocation parameters.
    pub channel: ChannelOptions,
    /// Budget for one simulate request.
    pub request_timeout: Duration,
    /// Reclaim stale OS primitives on start-up.
    pub reclaim_stale: bool,
    /// Wait for in-flight requests and clean up sessions on Ctrl-C/SIGTERM.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: ChannelOptions) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn without_reclaim(mut self) -> Self {
        self.reclaim_stale = false;
        self
    }

    pub fn without_graceful_shutdown(mut self) -> Self {
        self.graceful_shutdown = false;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the application state described by this configuration.
    pub fn app_state(&self) -> AppState {
        let registry = Arc::new(SessionRegistry::new(self.channel.clone()));
        AppState {
            gateway: Gateway::new(registry, self.request_timeout),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            channel: ChannelOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reclaim_stale: true,
            graceful_shutdown: true,
        }
    }
}

/// Start the API server.
pub async fn serve(config: ServerConfig) -> crate::Result<()> {
    let state = config.app_state();
    serve_with_state(config, state).await
}

/// Start the API server with custom state.
///
/// On graceful shutdown every session is cleaned up so no OS primitive
/// outlives the process.
pub async fn serve_with_state(config: ServerConfig, state: AppState) -> crate::Result<()> {
    if config.reclaim_stale {
        match crate::session::reclaim_stale(&config.channel) {
            Ok(true) => tracing::info!("removed IPC resources left by a previous run"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "stale resource reclamation failed"),
        }
    }

    let addr = config.bind_address();
    let registry = state.registry().clone();
    let router = create_router_with_state(state);

    tracing::info!("Starting ipc-sim API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::error::IpcError::Io)?;

    let server = axum::serve(listener, router);
    let result = if config.graceful_shutdown {
        server.with_graceful_shutdown(shutdown_signal()).await
    } else {
        server.await
    };
    result.map_err(|e| crate::error::IpcError::Io(std::io::Error::other(e.to_string())))?;

    registry.cleanup_all();
    tracing::info!("ipc-sim stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert!(config.reclaim_stale);
        assert!(config.graceful_shutdown);
    }

    #[test]
    fn test_server_config_custom() {
        let config = ServerConfig::new("0.0.0.0", 8080)
            .without_reclaim()
            .without_graceful_shutdown()
            .with_request_timeout(Duration::from_secs(2));
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.reclaim_stale);
        assert!(!config.graceful_shutdown);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_app_state_uses_channel_options() {
        let config = ServerConfig::default()
            .with_channel(ChannelOptions::default().with_shm_capacity(16));
        let state = config.app_state();
        let session = state.registry().get(crate::channel::ChannelKind::SharedMemory);
        session.init().unwrap();
        assert!(matches!(
            session.write(&[0u8; 17]),
            Err(crate::error::IpcError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_router_creation() {
        let _router = create_router();
    }
}
