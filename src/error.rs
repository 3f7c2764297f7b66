//! Error types for ipc-sim.

use thiserror::Error;

/// Main error type for IPC simulation operations.
///
/// Variants carry only summarized, caller-safe text. Raw OS diagnostics are
/// logged at the channel boundary and never stored here.
#[derive(Error, Debug)]
pub enum IpcError {
    /// Unknown action or channel kind in a request.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// `init` called on a session that already owns a channel.
    #[error("{0} already initialized")]
    AlreadyInitialized(crate::channel::ChannelKind),

    /// Operation requires a channel but the session has none.
    #[error("{0} not initialized")]
    NotInitialized(crate::channel::ChannelKind),

    /// `write` called without a message.
    #[error("message parameter required")]
    MissingPayload,

    /// Payload does not fit into the shared-memory segment.
    #[error("payload of {size} bytes exceeds capacity of {capacity} bytes")]
    PayloadTooLarge { size: usize, capacity: usize },

    /// The other end of the channel is gone.
    #[error("broken channel: {0}")]
    BrokenChannel(&'static str),

    /// Operation did not complete within its time budget.
    #[error("operation timed out")]
    Timeout,

    /// The OS refused to allocate the primitive.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(&'static str),

    /// Channel handle was already released.
    #[error("channel already destroyed")]
    AlreadyDestroyed,

    /// Internal failure (poisoned lock, failed worker task).
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error outside the channel layer (listener bind, serve).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IpcError {
    /// Stable machine-checkable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAction(_) => "INVALID_ACTION",
            Self::AlreadyInitialized(_) => "ALREADY_INITIALIZED",
            Self::NotInitialized(_) => "NOT_INITIALIZED",
            Self::MissingPayload => "MISSING_PAYLOAD",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::BrokenChannel(_) => "BROKEN_CHANNEL",
            Self::Timeout => "TIMEOUT",
            Self::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            // AlreadyDestroyed never reaches callers; cleanup swallows it.
            Self::AlreadyDestroyed | Self::Internal(_) | Self::Io(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller is at fault (as opposed to the channel or the host).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAction(_)
                | Self::AlreadyInitialized(_)
                | Self::NotInitialized(_)
                | Self::MissingPayload
        )
    }
}

/// Convenience Result type for ipc-sim operations.
pub type Result<T> = std::result::Result<T, IpcError>;
