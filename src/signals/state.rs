/*!
 * Process-Wide Signal State
 *
 * The only mutable state shared across the signal-handler boundary. Every cell
 * is a single atomic word, const-initialized before `main` runs, so a handler
 * firing at any moment reads either the old or the new value and never a torn
 * one.
 *
 * Initialization order:
 * 1. All cells start at their const defaults (no write end, dump off,
 *    dump to stderr, `Notify` policy, zeroed counters).
 * 2. `apply_config` / the controller entry points may overwrite the dump and
 *    policy cells at any time.
 * 3. The write-end cell is written only by the installer, under its lock, and
 *    only after the descriptor it publishes is fully configured.
 */

use super::atomic_stats::AtomicBridgeStats;
use super::types::TerminationPolicy;
use crate::core::limits::NO_FD;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

/// Write end of the notification channel, or `NO_FD`
static NOTIFY_FD: AtomicI32 = AtomicI32::new(NO_FD);

/// Dump-enabled flag
static BACKTRACE_DUMP: AtomicBool = AtomicBool::new(false);

/// Destination of the crash dump
static DUMP_FD: AtomicI32 = AtomicI32::new(libc::STDERR_FILENO);

/// `TerminationPolicy` as its `u8` discriminant
static TERMINATION: AtomicU8 = AtomicU8::new(TerminationPolicy::Notify as u8);

/// Counters updated by the trampoline
pub static STATS: AtomicBridgeStats = AtomicBridgeStats::new();

/// Current write end; `None` when notifications are being dropped
#[inline(always)]
pub fn notify_fd() -> Option<RawFd> {
    let fd = NOTIFY_FD.load(Ordering::Acquire);
    (fd >= 0).then_some(fd)
}

/// Publish a new write end in one atomic step and return the previous one
pub(crate) fn swap_notify_fd(fd: Option<RawFd>) -> Option<RawFd> {
    let previous = NOTIFY_FD.swap(fd.unwrap_or(NO_FD), Ordering::AcqRel);
    (previous >= 0).then_some(previous)
}

#[inline(always)]
pub fn backtrace_dump_enabled() -> bool {
    BACKTRACE_DUMP.load(Ordering::Acquire)
}

pub(crate) fn set_backtrace_dump(enabled: bool) {
    BACKTRACE_DUMP.store(enabled, Ordering::Release);
}

#[inline(always)]
pub fn dump_fd() -> RawFd {
    DUMP_FD.load(Ordering::Acquire)
}

pub(crate) fn set_dump_fd(fd: RawFd) {
    DUMP_FD.store(fd, Ordering::Release);
}

#[inline(always)]
pub fn termination_policy() -> TerminationPolicy {
    TerminationPolicy::from_u8(TERMINATION.load(Ordering::Acquire))
}

pub(crate) fn set_termination_policy(policy: TerminationPolicy) {
    TERMINATION.store(policy as u8, Ordering::Release);
}
