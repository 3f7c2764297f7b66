//! HTTP API for ipc-sim.
//!
//! ## Endpoints
//!
//! - `GET /` - Welcome document with usage examples
//! - `GET /health` - Health check
//! - `GET /simulate` - Status of both sessions
//! - `GET /simulate/{kind}/status` - Status of one session
//! - `GET /simulate/{kind}/{action}` - Run `init`, `write?message=..`, `read`
//!   or `cleanup` against the `shared_memory` or `pipe` session
//!
//! ## Example
//!
//! ```no_run
//! use ipc_sim::api::{ServerConfig, serve};
//!
//! #[tokio::main]
//! async fn main() -> ipc_sim::Result<()> {
//!     let config = ServerConfig::new("127.0.0.1", 8000);
//!     serve(config).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

// Re-export commonly used types
pub use handlers::{status_for, AppState};
pub use router::{create_router, create_router_with_state, serve, serve_with_state, ServerConfig};
pub use types::{
    ErrorResponse, ListSessionsResponse, SessionStatusResponse, SimulateQuery, SimulateResponse,
};
