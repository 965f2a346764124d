/*!
 * Signal Trampoline
 *
 * The handler registered with the OS. It runs on whatever thread the signal
 * interrupted, so everything here is async-signal-safe: atomic loads and
 * stores, `write(2)`, `sigaction(2)`, `raise(3)`. No allocation, no locks,
 * no `tracing`, no `core::fmt`.
 *
 * Termination policy:
 * - crash signals (`Signal::is_crash`) are always re-raised with the default
 *   disposition after notifying, so the process dies with the right status;
 * - shutdown requests (`Signal::requests_shutdown`) re-raise only under
 *   `TerminationPolicy::Reraise`, otherwise the consumer decides;
 * - everything else returns after notifying.
 */

use super::dump;
use super::state;
use super::types::{NotificationRecord, Signal, TerminationPolicy};
use crate::core::errno::{self, ErrnoGuard};
use crate::core::limits::NOTIFY_WRITE_RETRIES;
use libc::{c_int, c_void, siginfo_t};
use nix::errno::Errno;
use std::ptr;

/// Entry point installed with `SA_SIGINFO`
pub(crate) extern "C" fn trampoline(signum: c_int, _info: *mut siginfo_t, _context: *mut c_void) {
    let _errno = ErrnoGuard::save();

    notify(signum);

    let Some(signal) = Signal::lookup(signum) else {
        return;
    };

    if signal.is_crash() && state::backtrace_dump_enabled() {
        dump::write_backtrace(signal);
    }

    if reraises(signal, state::termination_policy()) {
        reraise(signum);
    }
}

/// Whether the trampoline re-raises `signal` with its default disposition
pub fn reraises(signal: Signal, policy: TerminationPolicy) -> bool {
    signal.is_crash() || (signal.requests_shutdown() && policy == TerminationPolicy::Reraise)
}

/// Push one record to the active write end; drop it if absent or full
#[inline(always)]
pub(crate) fn notify(signum: c_int) -> bool {
    let Some(fd) = state::notify_fd() else {
        state::STATS.record_dropped();
        return false;
    };

    let bytes = NotificationRecord::new(signum).encode();
    for _ in 0..NOTIFY_WRITE_RETRIES {
        // SAFETY: 4-byte stack buffer; a bad descriptor only yields EBADF
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if n == bytes.len() as isize {
            state::STATS.record_delivered(signum);
            return true;
        }
        if !(n < 0 && errno::get() == libc::EINTR) {
            break;
        }
    }

    state::STATS.record_dropped();
    false
}

/// Reset to SIG_DFL and raise again.
///
/// The signal is blocked while its handler runs, so the raised instance stays
/// pending and is delivered with the default action as soon as we return. A
/// hardware fault re-executes the faulting instruction and lands there too.
fn reraise(signum: c_int) {
    // SAFETY: zeroed sigaction is a valid SIG_DFL request with an empty mask
    unsafe {
        let mut default: libc::sigaction = std::mem::zeroed();
        default.sa_sigaction = libc::SIG_DFL;
        libc::sigemptyset(&mut default.sa_mask);
        libc::sigaction(signum, &default, ptr::null_mut());
        libc::raise(signum);
    }
}

/// An action as sigaction(2) reports it, kept for restoring later
pub(crate) type SavedAction = libc::sigaction;

/// Register the trampoline for `signal`, returning the action it replaced
///
/// Goes through libc directly: real-time numbers have no `nix` signal variant.
pub(crate) fn register(signal: Signal) -> nix::Result<SavedAction> {
    // SAFETY: zeroed sigaction is a valid starting point; the trampoline is
    // async-signal-safe
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = trampoline_address();
        action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART | libc::SA_ONSTACK;
        libc::sigemptyset(&mut action.sa_mask);

        let mut previous: libc::sigaction = std::mem::zeroed();
        Errno::result(libc::sigaction(signal.number(), &action, &mut previous))?;
        Ok(previous)
    }
}

/// Put a previously saved action back
pub(crate) fn restore(signal: Signal, previous: &SavedAction) -> nix::Result<()> {
    // SAFETY: `previous` came from sigaction(2) for this very signal
    Errno::result(unsafe { libc::sigaction(signal.number(), previous, ptr::null_mut()) })?;
    Ok(())
}

/// Read the current action without changing it
pub(crate) fn current_handler(signal: Signal) -> nix::Result<libc::sighandler_t> {
    // SAFETY: a null new-action pointer makes sigaction(2) read-only
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        Errno::result(libc::sigaction(signal.number(), ptr::null(), &mut current))?;
        Ok(current.sa_sigaction)
    }
}

/// Address the OS reports for the trampoline
#[inline]
pub(crate) fn trampoline_address() -> libc::sighandler_t {
    trampoline as extern "C" fn(c_int, *mut siginfo_t, *mut c_void) as libc::sighandler_t
}
