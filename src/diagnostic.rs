/*!
 * Diagnostic Emitter
 *
 * Raw, unbuffered writes to a descriptor for contexts where `tracing` or the
 * std I/O stack is unsafe: signal handlers, early startup, teardown. Delivery
 * is best-effort; a backpressured stream truncates the message instead of
 * blocking the caller indefinitely.
 */

use crate::core::errno;
use crate::core::limits::{DIAGNOSTIC_POLL_TIMEOUT_MS, DIAGNOSTIC_WRITE_ATTEMPTS, RAW_LINE_CAPACITY};
use std::os::fd::RawFd;

/// Write `text` to standard error, fire-and-forget
pub fn emit_diagnostic(text: &str) {
    let _ = emit_diagnostic_to(libc::STDERR_FILENO, text.as_bytes());
}

/// Write `bytes` to `fd` and return how many bytes made it out.
///
/// Async-signal-safe: only `poll(2)` and `write(2)`, errno is preserved.
/// Interrupted and short writes are retried; `EAGAIN` waits briefly for
/// writability and any other error ends the attempt.
pub fn emit_diagnostic_to(fd: RawFd, bytes: &[u8]) -> usize {
    let _errno = errno::ErrnoGuard::save();
    let mut written = 0usize;
    let mut attempts = 0usize;

    while written < bytes.len() && attempts < DIAGNOSTIC_WRITE_ATTEMPTS {
        attempts += 1;
        let rest = &bytes[written..];
        // SAFETY: `rest` is a valid readable slice for its whole length
        let n = unsafe { libc::write(fd, rest.as_ptr().cast(), rest.len()) };

        if n > 0 {
            written += n as usize;
            continue;
        }

        match errno::get() {
            libc::EINTR if n < 0 => continue,
            libc::EAGAIN if n < 0 => {
                if !wait_writable(fd) {
                    break;
                }
            }
            _ => break,
        }
    }

    written
}

fn wait_writable(fd: RawFd) -> bool {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };
    // SAFETY: one valid pollfd on the stack
    let ready = unsafe { libc::poll(&mut pollfd, 1, DIAGNOSTIC_POLL_TIMEOUT_MS) };
    ready > 0 && pollfd.revents & libc::POLLOUT != 0
}

/// Fixed-capacity line builder living on the stack
///
/// Formats numbers without `core::fmt`, so it can be used from handler
/// context. Content past the capacity is silently truncated.
pub struct RawLine {
    buf: [u8; RAW_LINE_CAPACITY],
    len: usize,
}

impl RawLine {
    #[inline]
    pub const fn new() -> Self {
        Self {
            buf: [0; RAW_LINE_CAPACITY],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_byte(&mut self, byte: u8) -> &mut Self {
        if self.len < RAW_LINE_CAPACITY {
            self.buf[self.len] = byte;
            self.len += 1;
        }
        self
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        for &byte in s.as_bytes() {
            self.push_byte(byte);
        }
        self
    }

    /// Decimal, left-padded with zeros to `width` digits
    pub fn push_decimal(&mut self, mut value: u64, width: usize) -> &mut Self {
        let mut digits = [0u8; 20];
        let mut count = 0;
        loop {
            digits[count] = b'0' + (value % 10) as u8;
            count += 1;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        for _ in count..width {
            self.push_byte(b'0');
        }
        while count > 0 {
            count -= 1;
            self.push_byte(digits[count]);
        }
        self
    }

    pub fn push_signed(&mut self, value: i64) -> &mut Self {
        if value < 0 {
            self.push_byte(b'-');
        }
        self.push_decimal(value.unsigned_abs(), 0)
    }

    /// Lowercase hex, full pointer width, no prefix
    pub fn push_hex(&mut self, value: usize) -> &mut Self {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";
        let nibbles = usize::BITS as usize / 4;
        for i in (0..nibbles).rev() {
            self.push_byte(DIGITS[(value >> (i * 4)) & 0xf]);
        }
        self
    }
}

impl Default for RawLine {
    fn default() -> Self {
        Self::new()
    }
}
