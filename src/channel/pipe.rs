//! Anonymous kernel pipe.
//!
//! Both ends are non-blocking; waits are done with `poll(2)` against a
//! deadline so no call on this channel can block past its read timeout.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

use super::{summarize_os_error, unavailable, Capacity, Channel, ChannelKind};
use crate::error::IpcError;
use crate::Result;

/// Buffer size for draining the read end.
const READ_BUFFER_SIZE: usize = 4096;

/// Both ends of a pipe plus its wait budget.
pub struct PipeChannel {
    /// `(read end, write end)`, `None` once destroyed.
    ends: Option<(OwnedFd, OwnedFd)>,
    read_timeout: Duration,
}

impl PipeChannel {
    /// Open a new pipe whose reads wait at most `read_timeout` for data.
    pub fn create(read_timeout: Duration) -> Result<Self> {
        let mut fds: [libc::c_int; 2] = [-1; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(unavailable("pipe", io::Error::last_os_error()));
        }

        let (reader, writer) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        for fd in [reader.as_raw_fd(), writer.as_raw_fd()] {
            configure(fd).map_err(|e| unavailable("fcntl", e))?;
        }

        tracing::debug!(read_fd = fds[0], write_fd = fds[1], "pipe opened");

        Ok(Self {
            ends: Some((reader, writer)),
            read_timeout,
        })
    }

    fn ends(&self) -> Result<&(OwnedFd, OwnedFd)> {
        self.ends.as_ref().ok_or(IpcError::AlreadyDestroyed)
    }
}

impl Channel for PipeChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Pipe
    }

    fn capacity(&self) -> Capacity {
        Capacity::Unbounded
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        let fd = self.ends()?.1.as_raw_fd();
        let deadline = Instant::now() + self.read_timeout;
        let mut written = 0;

        while written < payload.len() {
            let rest = &payload[written..];
            let n = unsafe { libc::write(fd, rest.as_ptr() as *const libc::c_void, rest.len()) };
            if n >= 0 {
                written += n as usize;
                continue;
            }

            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                // Pipe buffer full; nobody drains it until the next read.
                Some(libc::EAGAIN) => {
                    if !wait_ready(fd, libc::POLLOUT, deadline)? {
                        tracing::warn!(written, total = payload.len(), "pipe write timed out");
                        return Err(IpcError::Timeout);
                    }
                }
                _ => return Err(broken("write", err)),
            }
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        let fd = self.ends()?.0.as_raw_fd();
        let deadline = Instant::now() + self.read_timeout;

        if !wait_ready(fd, libc::POLLIN, deadline)? {
            return Err(IpcError::Timeout);
        }

        let mut out = Vec::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n > 0 {
                out.extend_from_slice(&buf[..n as usize]);
                continue;
            }
            if n == 0 {
                if out.is_empty() {
                    return Err(IpcError::BrokenChannel("write end closed"));
                }
                break;
            }

            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) => break,
                _ => return Err(broken("read", err)),
            }
        }
        Ok(out)
    }

    fn destroy(&mut self) -> Result<()> {
        let (reader, writer) = self.ends.take().ok_or(IpcError::AlreadyDestroyed)?;
        tracing::debug!(
            read_fd = reader.as_raw_fd(),
            write_fd = writer.as_raw_fd(),
            "pipe closed"
        );
        drop(reader);
        drop(writer);
        Ok(())
    }
}

/// Mark a descriptor non-blocking and close-on-exec.
fn configure(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags == -1 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
            return Err(io::Error::last_os_error());
        }
        let fd_flags = libc::fcntl(fd, libc::F_GETFD);
        if fd_flags == -1 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Wait until `fd` reports `events` or the deadline passes.
///
/// Polls at least once, so data already buffered is seen even when the
/// budget is spent. Returns `Ok(false)` on timeout. Hang-up and error
/// conditions count as ready so the following read/write reports them.
fn wait_ready(fd: RawFd, events: libc::c_short, deadline: Instant) -> Result<bool> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());

        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let timeout_ms = remaining
            .as_micros()
            .div_ceil(1000)
            .min(libc::c_int::MAX as u128) as libc::c_int;
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };

        match rc {
            0 if remaining.is_zero() => return Ok(false),
            0 => continue,
            n if n > 0 => return Ok(true),
            _ => {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(broken("poll", err));
            }
        }
    }
}

fn broken(op: &'static str, err: io::Error) -> IpcError {
    tracing::warn!(op, error = %err, "pipe operation failed");
    IpcError::BrokenChannel(summarize_os_error(&err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> PipeChannel {
        PipeChannel::create(Duration::from_millis(100)).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let mut p = pipe();
        p.write(b"x").unwrap();
        assert_eq!(p.read().unwrap(), b"x");
        assert_eq!(p.capacity(), Capacity::Unbounded);
    }

    #[test]
    fn test_read_is_destructive() {
        let mut p = pipe();
        p.write(b"once").unwrap();
        assert_eq!(p.read().unwrap(), b"once");

        let start = Instant::now();
        assert!(matches!(p.read(), Err(IpcError::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_writes_accumulate_in_stream() {
        let mut p = pipe();
        p.write(b"Hello, ").unwrap();
        p.write(b"pipe").unwrap();
        assert_eq!(p.read().unwrap(), b"Hello, pipe");
    }

    #[test]
    fn test_large_payload_drained_in_one_read() {
        let mut p = pipe();
        let payload = vec![b'a'; READ_BUFFER_SIZE * 3 + 7];
        p.write(&payload).unwrap();
        assert_eq!(p.read().unwrap(), payload);
    }

    #[test]
    fn test_empty_pipe_times_out() {
        let mut p = PipeChannel::create(Duration::from_millis(20)).unwrap();
        assert!(matches!(p.read(), Err(IpcError::Timeout)));
    }

    #[test]
    fn test_zero_timeout_still_sees_buffered_data() {
        let mut p = PipeChannel::create(Duration::ZERO).unwrap();
        p.write(b"data").unwrap();
        assert_eq!(p.read().unwrap(), b"data");
        assert!(matches!(p.read(), Err(IpcError::Timeout)));
    }

    #[test]
    fn test_double_destroy() {
        let mut p = pipe();
        p.destroy().unwrap();
        assert!(matches!(p.destroy(), Err(IpcError::AlreadyDestroyed)));
        assert!(matches!(p.write(b"x"), Err(IpcError::AlreadyDestroyed)));
        assert!(matches!(p.read(), Err(IpcError::AlreadyDestroyed)));
    }
}
