/*!
 * Notification Channel
 * Non-blocking pipe carrying signal records out of handler context
 */

use super::types::NotificationRecord;
use crate::core::errors::{BridgeError, BridgeResult};
use crate::core::limits::{DRAIN_BATCH_RECORDS, RECORD_SIZE};
use nix::errno::Errno;
#[cfg(not(target_vendor = "apple"))]
use nix::{fcntl::OFlag, unistd::pipe2};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tracing::{debug, warn};

/// Factory for endpoint pairs
pub struct NotificationChannel;

impl NotificationChannel {
    /// Open a pipe with both ends non-blocking and close-on-exec
    pub fn open() -> BridgeResult<(NotifySender, NotificationReceiver)> {
        Self::open_with_capacity(None)
    }

    /// Open a pipe, asking the kernel for `capacity` bytes of buffer where supported
    pub fn open_with_capacity(
        capacity: Option<usize>,
    ) -> BridgeResult<(NotifySender, NotificationReceiver)> {
        let (read, write) = nonblocking_pipe()?;

        if let Some(bytes) = capacity {
            resize_pipe(write.as_raw_fd(), bytes);
        }

        debug!(
            read_fd = read.as_raw_fd(),
            write_fd = write.as_raw_fd(),
            "Opened notification channel"
        );

        Ok((
            NotifySender { fd: write },
            NotificationReceiver {
                fd: read,
                carry: [0; RECORD_SIZE],
                carry_len: 0,
            },
        ))
    }
}

/// Both ends created non-blocking and close-on-exec in one step
#[cfg(not(target_vendor = "apple"))]
fn nonblocking_pipe() -> BridgeResult<(OwnedFd, OwnedFd)> {
    pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
        .map_err(|e| BridgeError::ChannelSetup(format!("pipe2: {}", e)))
}

/// No pipe2(2) here: flags are applied right after creation
#[cfg(target_vendor = "apple")]
fn nonblocking_pipe() -> BridgeResult<(OwnedFd, OwnedFd)> {
    let (read, write) =
        nix::unistd::pipe().map_err(|e| BridgeError::ChannelSetup(format!("pipe: {}", e)))?;
    for fd in [read.as_raw_fd(), write.as_raw_fd()] {
        set_nonblocking(fd).map_err(|e| BridgeError::ChannelSetup(format!("O_NONBLOCK: {}", e)))?;
        set_cloexec(fd).map_err(|e| BridgeError::ChannelSetup(format!("FD_CLOEXEC: {}", e)))?;
    }
    Ok((read, write))
}

/// Switch a descriptor to non-blocking mode
pub(crate) fn set_nonblocking(fd: RawFd) -> nix::Result<()> {
    // SAFETY: fcntl on an arbitrary integer is memory-safe; EBADF is reported
    let flags = Errno::result(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    if flags & libc::O_NONBLOCK == 0 {
        // SAFETY: as above
        Errno::result(unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) })?;
    }
    Ok(())
}

#[cfg(target_vendor = "apple")]
fn set_cloexec(fd: RawFd) -> nix::Result<()> {
    // SAFETY: fcntl on an owned descriptor
    let flags = Errno::result(unsafe { libc::fcntl(fd, libc::F_GETFD) })?;
    // SAFETY: as above
    Errno::result(unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) })?;
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn resize_pipe(fd: RawFd, bytes: usize) {
    let requested = libc::c_int::try_from(bytes).unwrap_or(libc::c_int::MAX);
    // SAFETY: F_SETPIPE_SZ on a pipe we own
    match Errno::result(unsafe { libc::fcntl(fd, libc::F_SETPIPE_SZ, requested) }) {
        Ok(actual) => debug!(requested, actual, "Resized notification pipe"),
        Err(e) => warn!(requested, error = %e, "Could not resize notification pipe"),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn resize_pipe(_fd: RawFd, bytes: usize) {
    debug!(requested = bytes, "Pipe resizing not supported on this platform");
}

/// Bytes the pipe behind `fd` can buffer, where the platform reports it
pub fn pipe_capacity(fd: RawFd) -> Option<usize> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        // SAFETY: F_GETPIPE_SZ only reads
        Errno::result(unsafe { libc::fcntl(fd, libc::F_GETPIPE_SZ) })
            .ok()
            .and_then(|n| usize::try_from(n).ok())
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        let _ = fd;
        None
    }
}

/// Owned write end, handed to the bridge with `set_notification_sender`
#[derive(Debug)]
pub struct NotifySender {
    fd: OwnedFd,
}

impl NotifySender {
    /// Take ownership of an already-open descriptor, switching it to non-blocking
    pub fn from_owned(fd: OwnedFd) -> BridgeResult<Self> {
        set_nonblocking(fd.as_raw_fd()).map_err(|_| BridgeError::InvalidDescriptor(fd.as_raw_fd()))?;
        Ok(Self { fd })
    }

    /// Write one record outside handler context
    ///
    /// Returns `Ok(false)` when the channel is full.
    pub fn send(&self, record: NotificationRecord) -> BridgeResult<bool> {
        let bytes = record.encode();
        loop {
            // SAFETY: writing a 4-byte stack buffer to an owned descriptor
            let n = unsafe { libc::write(self.fd.as_raw_fd(), bytes.as_ptr().cast(), bytes.len()) };
            match Errno::result(n) {
                Ok(_) => return Ok(true),
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => return Ok(false),
                Err(e) => return Err(BridgeError::Io(e.to_string())),
            }
        }
    }
}

impl AsRawFd for NotifySender {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for NotifySender {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Read end handed to the consumer
///
/// Decodes records only; dispatching them is the consumer's business. A
/// consumer must expect dropped and collapsed notifications.
#[derive(Debug)]
pub struct NotificationReceiver {
    fd: OwnedFd,
    carry: [u8; RECORD_SIZE],
    carry_len: usize,
}

impl NotificationReceiver {
    /// Wrap an existing read end, switching it to non-blocking
    pub fn from_owned(fd: OwnedFd) -> BridgeResult<Self> {
        set_nonblocking(fd.as_raw_fd()).map_err(|_| BridgeError::InvalidDescriptor(fd.as_raw_fd()))?;
        Ok(Self {
            fd,
            carry: [0; RECORD_SIZE],
            carry_len: 0,
        })
    }

    /// Read one record if one is available
    ///
    /// Returns `Ok(None)` when the pipe is empty or every writer is gone.
    pub fn try_recv(&mut self) -> BridgeResult<Option<NotificationRecord>> {
        while self.carry_len < RECORD_SIZE {
            let rest = &mut self.carry[self.carry_len..];
            // SAFETY: `rest` is a writable buffer of its own length
            let n = unsafe { libc::read(self.fd.as_raw_fd(), rest.as_mut_ptr().cast(), rest.len()) };
            match Errno::result(n) {
                Ok(0) => return Ok(None),
                Ok(n) => self.carry_len += n as usize,
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => return Ok(None),
                Err(e) => return Err(BridgeError::Io(e.to_string())),
            }
        }

        self.carry_len = 0;
        Ok(Some(NotificationRecord::decode(self.carry)))
    }

    /// Read every record currently buffered
    pub fn drain(&mut self) -> BridgeResult<Vec<NotificationRecord>> {
        let mut records = Vec::with_capacity(DRAIN_BATCH_RECORDS);
        while let Some(record) = self.try_recv()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Block up to `timeout` for the read end to become readable
    pub fn wait_readable(&self, timeout: Duration) -> BridgeResult<bool> {
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        let mut pollfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        loop {
            // SAFETY: one valid pollfd on the stack
            match Errno::result(unsafe { libc::poll(&mut pollfd, 1, millis) }) {
                Ok(0) => return Ok(false),
                Ok(_) => return Ok(pollfd.revents & (libc::POLLIN | libc::POLLHUP) != 0),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(BridgeError::Io(e.to_string())),
            }
        }
    }

    /// Register with the current tokio reactor
    pub fn into_async(self) -> BridgeResult<AsyncNotificationReceiver> {
        AsyncNotificationReceiver::new(self)
    }
}

impl AsRawFd for NotificationReceiver {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for NotificationReceiver {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Read end driven by a tokio event loop
pub struct AsyncNotificationReceiver {
    inner: AsyncFd<NotificationReceiver>,
}

impl AsyncNotificationReceiver {
    /// Must be called from within a tokio runtime
    pub fn new(receiver: NotificationReceiver) -> BridgeResult<Self> {
        Ok(Self {
            inner: AsyncFd::new(receiver)?,
        })
    }

    /// Wait for the next record
    ///
    /// Returns `Ok(None)` once every writer has closed and the pipe is empty.
    pub async fn recv(&mut self) -> BridgeResult<Option<NotificationRecord>> {
        loop {
            let mut guard = self.inner.readable_mut().await?;
            match guard.get_inner_mut().try_recv()? {
                Some(record) => return Ok(Some(record)),
                None if guard.ready().is_read_closed() => return Ok(None),
                None => guard.clear_ready(),
            }
        }
    }

    /// Give the synchronous receiver back
    pub fn into_inner(self) -> NotificationReceiver {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_then_receive() {
        let (sender, mut receiver) = NotificationChannel::open().unwrap();
        assert!(receiver.try_recv().unwrap().is_none());

        assert!(sender.send(NotificationRecord::new(libc::SIGUSR1)).unwrap());
        assert!(sender.send(NotificationRecord::new(libc::SIGHUP)).unwrap());
        assert!(receiver.wait_readable(Duration::from_millis(100)).unwrap());

        let records = receiver.drain().unwrap();
        assert_eq!(
            records,
            vec![
                NotificationRecord::new(libc::SIGUSR1),
                NotificationRecord::new(libc::SIGHUP)
            ]
        );
    }

    #[test]
    fn test_partial_record_is_carried() {
        let (sender, mut receiver) = NotificationChannel::open().unwrap();
        let bytes = NotificationRecord::new(libc::SIGWINCH).encode();

        // SAFETY: raw writes to our own pipe
        unsafe { libc::write(sender.as_raw_fd(), bytes.as_ptr().cast(), 1) };
        assert!(receiver.try_recv().unwrap().is_none());

        unsafe { libc::write(sender.as_raw_fd(), bytes[1..].as_ptr().cast(), RECORD_SIZE - 1) };
        assert_eq!(
            receiver.try_recv().unwrap(),
            Some(NotificationRecord::new(libc::SIGWINCH))
        );
    }

    #[test]
    fn test_both_ends_nonblocking() {
        let (sender, receiver) = NotificationChannel::open().unwrap();
        for fd in [sender.as_raw_fd(), receiver.as_raw_fd()] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            assert_ne!(flags & libc::O_NONBLOCK, 0);
        }
    }

    #[test]
    fn test_both_ends_close_on_exec() {
        let (sender, receiver) = NotificationChannel::open().unwrap();
        for fd in [sender.as_raw_fd(), receiver.as_raw_fd()] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert_ne!(flags & libc::FD_CLOEXEC, 0);
        }
    }

    #[test]
    fn test_wait_readable_times_out() {
        let (_sender, receiver) = NotificationChannel::open().unwrap();
        assert!(!receiver.wait_readable(Duration::from_millis(10)).unwrap());
    }
}
