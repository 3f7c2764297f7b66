//! # ipc-sim
//!
//! HTTP service simulating shared-memory and pipe interprocess communication.
//!
//! Each channel kind has one session that owns a real OS primitive (a System V
//! shared-memory segment or a kernel pipe) and enforces a strict lifecycle:
//! `init`, then any number of `write`/`read`, then `cleanup`. Operations that
//! are illegal in the current state fail with a typed error instead of
//! touching the OS.
//!
//! ## Features
//!
//! - **Real primitives**: segments and pipes are managed in-process, no
//!   helper binaries
//! - **Safe under concurrency**: every session serializes its operations
//!   behind its own lock
//! - **Bounded blocking**: pipe reads give up after at most five seconds
//! - **Stable errors**: OS failures are summarized into a fixed taxonomy
//!
//! ## Quick Start
//!
//! ```no_run
//! use ipc_sim::{ChannelKind, SessionRegistry};
//!
//! fn main() -> ipc_sim::Result<()> {
//!     ipc_sim::logging::try_init().ok();
//!
//!     let registry = SessionRegistry::default();
//!     let session = registry.get(ChannelKind::SharedMemory);
//!
//!     session.init()?;
//!     session.write(b"Hi")?;
//!     assert_eq!(session.read()?, b"Hi");
//!     session.cleanup()?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod session;

// Re-export commonly used types
pub use channel::{Capacity, Channel, ChannelKind, ChannelOptions};
pub use error::{IpcError, Result};
pub use gateway::{Gateway, Outcome, Request};
pub use session::{Action, Session, SessionRegistry, SessionSnapshot, SessionState};
