//! Per-kind IPC session.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{Action, SessionState};
use crate::channel::{self, Capacity, Channel, ChannelKind, ChannelOptions};
use crate::error::IpcError;
use crate::Result;

/// Point-in-time view of a session, safe to hand out.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub kind: ChannelKind,
    pub state: SessionState,
    /// Capacity of the live channel, if any.
    pub capacity: Option<Capacity>,
    /// Most recent payload written.
    pub last_message: Option<Vec<u8>>,
    /// Number of successful operations since process start.
    pub operations: u64,
    /// Time since the last successful operation.
    pub idle: Option<Duration>,
}

struct Inner {
    state: SessionState,
    channel: Option<Box<dyn Channel>>,
    last_message: Option<Vec<u8>>,
    operations: u64,
    last_activity: Option<Instant>,
}

impl Inner {
    fn touch(&mut self) {
        self.operations += 1;
        self.last_activity = Some(Instant::now());
    }
}

/// Lifecycle tracker owning the channel of one kind.
///
/// Every operation holds the session lock for its whole
/// validate -> OS call -> commit sequence, so operations on one session are
/// strictly serialized. The state only advances after the channel call
/// succeeds.
pub struct Session {
    kind: ChannelKind,
    options: ChannelOptions,
    inner: Mutex<Inner>,
}

impl Session {
    /// Create an uninitialized session.
    pub fn new(kind: ChannelKind, options: ChannelOptions) -> Self {
        Self {
            kind,
            options,
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                channel: None,
                last_message: None,
                operations: 0,
                last_activity: None,
            }),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| IpcError::Internal("session lock poisoned".into()))
    }

    /// Allocate the channel.
    pub fn init(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let next = inner.state.next(Action::Init, self.kind).map_err(|e| {
            debug!(kind = %self.kind, error = %e, "init rejected");
            e
        })?;

        let channel = channel::create(self.kind, &self.options)?;
        inner.channel = Some(channel);
        inner.state = next;
        inner.touch();

        info!(kind = %self.kind, "channel initialized");
        Ok(())
    }

    /// Write `payload` and remember it as the last message.
    pub fn write(&self, payload: &[u8]) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let next = inner.state.next(Action::Write, self.kind).map_err(|e| {
            debug!(kind = %self.kind, error = %e, "write rejected");
            e
        })?;
        let channel = inner
            .channel
            .as_mut()
            .ok_or(IpcError::NotInitialized(self.kind))?;

        channel.write(payload)?;
        inner.last_message = Some(payload.to_vec());
        inner.state = next;
        inner.touch();

        info!(kind = %self.kind, bytes = payload.len(), "message written");
        Ok(())
    }

    /// Read from the channel. Never changes the state.
    pub fn read(&self) -> Result<Vec<u8>> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        inner.state.next(Action::Read, self.kind).map_err(|e| {
            debug!(kind = %self.kind, error = %e, "read rejected");
            e
        })?;
        let channel = inner
            .channel
            .as_mut()
            .ok_or(IpcError::NotInitialized(self.kind))?;

        let data = channel.read()?;
        inner.touch();

        info!(kind = %self.kind, bytes = data.len(), "message read");
        Ok(data)
    }

    /// Release the channel and reset to `Uninitialized`.
    ///
    /// Always succeeds. A failing destroy is logged and the session is reset
    /// anyway, even when an earlier operation panicked and poisoned the lock.
    pub fn cleanup(&self) -> Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            warn!(kind = %self.kind, "session lock poisoned; forcing cleanup");
            self.inner.clear_poison();
            poisoned.into_inner()
        });
        let inner = &mut *guard;

        if !inner.state.has_channel() && inner.channel.is_none() {
            debug!(kind = %self.kind, "cleanup on uninitialized session");
            return Ok(());
        }

        if let Some(mut channel) = inner.channel.take() {
            if let Err(e) = channel.destroy() {
                warn!(kind = %self.kind, error = %e, "channel destroy failed; session reset anyway");
            }
        }

        inner.state = SessionState::Uninitialized;
        inner.last_message = None;
        inner.touch();

        info!(kind = %self.kind, "channel cleaned up");
        Ok(())
    }

    pub fn state(&self) -> Result<SessionState> {
        Ok(self.lock()?.state)
    }

    pub fn last_message(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.last_message.clone())
    }

    /// Capture the current state without touching the channel.
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        let inner = self.lock()?;
        Ok(SessionSnapshot {
            kind: self.kind,
            state: inner.state,
            capacity: inner.channel.as_ref().map(|c| c.capacity()),
            last_message: inner.last_message.clone(),
            operations: inner.operations,
            idle: inner.last_activity.map(|t| t.elapsed()),
        })
    }
}
