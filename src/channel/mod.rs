//! OS-level IPC channels.
//!
//! A channel wraps exactly one live kernel primitive: a System V shared-memory
//! segment or an anonymous pipe. Channels are created by [`create`] and owned
//! by a single session for their whole life.

mod pipe;
mod shm;

pub use pipe::PipeChannel;
pub use shm::SharedMemorySegment;

use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IpcError;
use crate::Result;

/// Default payload capacity of a shared-memory segment, in bytes.
pub const DEFAULT_SHM_CAPACITY: usize = 1024;

/// Hard upper bound for a blocking pipe read.
pub const MAX_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// The closed set of channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// System V shared-memory segment.
    SharedMemory,
    /// Unidirectional kernel pipe.
    Pipe,
}

impl ChannelKind {
    /// Every kind, in registry order.
    pub const ALL: [ChannelKind; 2] = [ChannelKind::SharedMemory, ChannelKind::Pipe];

    /// Identifier used in URLs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharedMemory => "shared_memory",
            Self::Pipe => "pipe",
        }
    }

    /// Human-readable name for response messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SharedMemory => "Shared memory",
            Self::Pipe => "Pipe",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = IpcError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "shared_memory" => Ok(Self::SharedMemory),
            "pipe" => Ok(Self::Pipe),
            other => Err(IpcError::InvalidAction(format!(
                "unknown channel kind '{}'",
                other
            ))),
        }
    }
}

/// Payload capacity of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    /// Fixed maximum payload size in bytes.
    Bounded(usize),
    /// Stream without a fixed payload limit.
    Unbounded,
}

/// Parameters used when allocating a channel.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Payload capacity of shared-memory segments.
    pub shm_capacity: usize,
    /// Well-known System V key. `None` allocates a private segment.
    pub shm_key: Option<i32>,
    /// How long a pipe read waits for data.
    pub read_timeout: Duration,
}

impl ChannelOptions {
    /// Set the pipe read timeout, clamped to [`MAX_READ_TIMEOUT`].
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout.min(MAX_READ_TIMEOUT);
        self
    }

    pub fn with_shm_capacity(mut self, capacity: usize) -> Self {
        self.shm_capacity = capacity;
        self
    }

    pub fn with_shm_key(mut self, key: Option<i32>) -> Self {
        self.shm_key = key;
        self
    }
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            shm_capacity: DEFAULT_SHM_CAPACITY,
            shm_key: None,
            read_timeout: MAX_READ_TIMEOUT,
        }
    }
}

/// One live OS IPC primitive.
///
/// Implementations map every OS failure into the [`IpcError`] taxonomy;
/// callers never see raw error codes.
pub trait Channel: Send {
    /// Kind of primitive behind this channel.
    fn kind(&self) -> ChannelKind;

    /// Payload capacity.
    fn capacity(&self) -> Capacity;

    /// Write a payload into the primitive.
    fn write(&mut self, payload: &[u8]) -> Result<()>;

    /// Read the current content.
    ///
    /// Shared memory reads are non-destructive; pipe reads consume the stream.
    fn read(&mut self) -> Result<Vec<u8>>;

    /// Release the primitive. Fails with [`IpcError::AlreadyDestroyed`] when
    /// called twice.
    fn destroy(&mut self) -> Result<()>;
}

/// Allocate a new channel of the given kind.
pub fn create(kind: ChannelKind, options: &ChannelOptions) -> Result<Box<dyn Channel>> {
    match kind {
        ChannelKind::SharedMemory => Ok(Box::new(SharedMemorySegment::create(
            options.shm_capacity,
            options.shm_key,
        )?)),
        ChannelKind::Pipe => Ok(Box::new(PipeChannel::create(options.read_timeout)?)),
    }
}

/// Summarize an OS error into stable, caller-safe text.
pub fn summarize_os_error(err: &io::Error) -> &'static str {
    match err.raw_os_error() {
        Some(libc::EACCES) | Some(libc::EPERM) => "permission denied",
        Some(libc::EMFILE) | Some(libc::ENFILE) => "too many open files",
        Some(libc::ENOMEM) => "out of memory",
        Some(libc::ENOSPC) => "system limit reached",
        Some(libc::EINVAL) => "invalid size or argument",
        Some(libc::EEXIST) => "resource already exists",
        Some(libc::ENOENT) | Some(libc::EIDRM) => "resource no longer exists",
        Some(libc::EPIPE) => "peer end closed",
        _ => "operating system error",
    }
}

/// Log an OS failure and map it to `ResourceUnavailable`.
pub(crate) fn unavailable(op: &'static str, err: io::Error) -> IpcError {
    tracing::warn!(op, error = %err, "OS call failed");
    IpcError::ResourceUnavailable(summarize_os_error(&err))
}
