//! Process-wide session registry.

use super::{Session, SessionSnapshot};
use crate::channel::{ChannelKind, ChannelOptions, SharedMemorySegment};
use crate::Result;

/// Fixed table of one session per channel kind.
///
/// Membership never changes after construction; each session carries its own
/// lock, so sessions of different kinds never contend.
pub struct SessionRegistry {
    shared_memory: Session,
    pipe: Session,
}

impl SessionRegistry {
    /// Create a registry whose sessions allocate channels with `options`.
    pub fn new(options: ChannelOptions) -> Self {
        Self {
            shared_memory: Session::new(ChannelKind::SharedMemory, options.clone()),
            pipe: Session::new(ChannelKind::Pipe, options),
        }
    }

    /// Get the session for a kind.
    pub fn get(&self, kind: ChannelKind) -> &Session {
        match kind {
            ChannelKind::SharedMemory => &self.shared_memory,
            ChannelKind::Pipe => &self.pipe,
        }
    }

    /// Iterate over all sessions in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        ChannelKind::ALL.into_iter().map(move |kind| self.get(kind))
    }

    /// Snapshot every session.
    pub fn snapshots(&self) -> Result<Vec<SessionSnapshot>> {
        self.iter().map(Session::snapshot).collect()
    }

    /// Clean up every session. Used on shutdown.
    pub fn cleanup_all(&self) {
        for session in self.iter() {
            if let Err(e) = session.cleanup() {
                tracing::warn!(kind = %session.kind(), error = %e, "cleanup on shutdown failed");
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ChannelOptions::default())
    }
}

/// Remove OS primitives left behind by a previous run.
///
/// Only keyed shared-memory segments can outlive the process; private
/// segments and pipes die with it. Returns whether anything was reclaimed.
pub fn reclaim_stale(options: &ChannelOptions) -> Result<bool> {
    match options.shm_key {
        Some(key) => SharedMemorySegment::reclaim(key),
        None => Ok(false),
    }
}
