//! System V shared-memory segment.
//!
//! Layout of the segment: a native-endian `u32` length header followed by
//! `capacity` payload bytes. The kernel zero-fills new segments, so a fresh
//! segment reads back as empty.

use std::io;
use std::mem;
use std::ptr::{self, NonNull};

use super::{unavailable, Capacity, Channel, ChannelKind};
use crate::error::IpcError;
use crate::Result;

const HEADER_LEN: usize = mem::size_of::<u32>();

/// Permission bits for new segments (owner read/write).
const SEGMENT_MODE: libc::c_int = 0o600;

/// A System V shared-memory segment attached to this process.
pub struct SharedMemorySegment {
    id: libc::c_int,
    /// `None` once the segment has been detached.
    addr: Option<NonNull<u8>>,
    capacity: usize,
    key: Option<libc::key_t>,
}

// The mapping is only touched through `&mut self`, and the owning session
// serializes all access behind its lock.
unsafe impl Send for SharedMemorySegment {}

impl SharedMemorySegment {
    /// Allocate and attach a segment holding up to `capacity` payload bytes.
    ///
    /// With a key, the segment is created exclusively under that key and
    /// stays visible to other processes until destroyed. Without one, it is
    /// private and marked for removal immediately, so the kernel frees it on
    /// the last detach, process exit included.
    pub fn create(capacity: usize, key: Option<i32>) -> Result<Self> {
        if capacity == 0 || capacity > u32::MAX as usize || key == Some(libc::IPC_PRIVATE) {
            return Err(IpcError::ResourceUnavailable("invalid size or argument"));
        }

        let (ipc_key, flags) = match key {
            Some(k) => (k as libc::key_t, libc::IPC_CREAT | libc::IPC_EXCL | SEGMENT_MODE),
            None => (libc::IPC_PRIVATE, libc::IPC_CREAT | SEGMENT_MODE),
        };

        let id = unsafe { libc::shmget(ipc_key, HEADER_LEN + capacity, flags) };
        if id == -1 {
            return Err(unavailable("shmget", io::Error::last_os_error()));
        }

        let raw = unsafe { libc::shmat(id, ptr::null(), 0) };
        if raw as isize == -1 {
            let err = io::Error::last_os_error();
            unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
            return Err(unavailable("shmat", err));
        }

        if key.is_none() {
            unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
        }

        let addr = NonNull::new(raw as *mut u8)
            .ok_or(IpcError::ResourceUnavailable("operating system error"))?;

        tracing::debug!(id, capacity, ?key, "shared memory segment attached");

        Ok(Self {
            id,
            addr: Some(addr),
            capacity,
            key: key.map(|k| k as libc::key_t),
        })
    }

    /// Remove a segment left under `key` by an earlier process.
    ///
    /// Returns `true` if a stale segment was found and marked for removal.
    pub fn reclaim(key: i32) -> Result<bool> {
        if key == libc::IPC_PRIVATE {
            return Ok(false);
        }

        let id = unsafe { libc::shmget(key as libc::key_t, 0, 0) };
        if id == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOENT) {
                return Ok(false);
            }
            return Err(unavailable("shmget", err));
        }

        if unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) } == -1 {
            return Err(unavailable("shmctl", io::Error::last_os_error()));
        }

        tracing::info!(key, id, "reclaimed stale shared memory segment");
        Ok(true)
    }

    /// Kernel identifier of the segment.
    pub fn id(&self) -> i32 {
        self.id
    }

    fn mapping(&self) -> Result<NonNull<u8>> {
        self.addr.ok_or(IpcError::AlreadyDestroyed)
    }
}

impl Channel for SharedMemorySegment {
    fn kind(&self) -> ChannelKind {
        ChannelKind::SharedMemory
    }

    fn capacity(&self) -> Capacity {
        Capacity::Bounded(self.capacity)
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        let base = self.mapping()?;
        if payload.len() > self.capacity {
            return Err(IpcError::PayloadTooLarge {
                size: payload.len(),
                capacity: self.capacity,
            });
        }

        // Payload first, length last: an outside reader never sees a length
        // that covers bytes not yet copied.
        unsafe {
            let data = base.as_ptr().add(HEADER_LEN);
            ptr::copy_nonoverlapping(payload.as_ptr(), data, payload.len());
            ptr::write_volatile(base.as_ptr() as *mut u32, payload.len() as u32);
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        let base = self.mapping()?;
        unsafe {
            let stored = ptr::read_volatile(base.as_ptr() as *const u32) as usize;
            // Other processes may attach by key; never trust the header blindly.
            let len = stored.min(self.capacity);
            let data = base.as_ptr().add(HEADER_LEN);
            Ok(std::slice::from_raw_parts(data, len).to_vec())
        }
    }

    fn destroy(&mut self) -> Result<()> {
        let addr = self.addr.take().ok_or(IpcError::AlreadyDestroyed)?;

        if unsafe { libc::shmdt(addr.as_ptr() as *const libc::c_void) } == -1 {
            return Err(unavailable("shmdt", io::Error::last_os_error()));
        }

        if self.key.is_some()
            && unsafe { libc::shmctl(self.id, libc::IPC_RMID, ptr::null_mut()) } == -1
        {
            return Err(unavailable("shmctl", io::Error::last_os_error()));
        }

        tracing::debug!(id = self.id, "shared memory segment destroyed");
        Ok(())
    }
}

impl Drop for SharedMemorySegment {
    fn drop(&mut self) {
        if self.addr.is_some() {
            let _ = self.destroy();
        }
    }
}
