//! Session management module.
//!
//! One session per channel kind tracks the lifecycle of its channel and
//! rejects operations that are illegal in the current state.

mod lifecycle;
mod registry;
mod state;

pub use lifecycle::{Session, SessionSnapshot};
pub use registry::{reclaim_stale, SessionRegistry};
pub use state::{Action, SessionState};
