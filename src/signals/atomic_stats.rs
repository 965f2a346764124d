/*!
 * Lock-Free Bridge Statistics
 * Plain atomic counters, safe to bump from signal-handler context
 */

use super::types::{BridgeStats, Signal};
use crate::core::limits::SIGNAL_SLOTS;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Atomic bridge statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing with neighbouring statics
/// - Handler-side updates are single relaxed `fetch_add`s: no locks, no allocation
#[repr(C, align(64))]
pub struct AtomicBridgeStats {
    records_delivered: AtomicU64,
    records_dropped: AtomicU64,
    dumps_written: AtomicU64,
    handlers_installed: AtomicUsize,
    per_signal: [AtomicU64; SIGNAL_SLOTS],
}

impl AtomicBridgeStats {
    /// Create new atomic stats
    pub const fn new() -> Self {
        Self {
            records_delivered: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            dumps_written: AtomicU64::new(0),
            handlers_installed: AtomicUsize::new(0),
            per_signal: [const { AtomicU64::new(0) }; SIGNAL_SLOTS],
        }
    }

    /// Record a notification that reached the channel
    ///
    /// # Performance
    /// Hot path - called from the trampoline
    #[inline(always)]
    pub fn record_delivered(&self, signum: i32) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
        if let Some(slot) = usize::try_from(signum).ok().and_then(|i| self.per_signal.get(i)) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a notification lost to backpressure or a missing write end
    #[inline(always)]
    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_dump(&self) {
        self.dumps_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_handlers(&self) {
        self.handlers_installed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dec_handlers(&self) {
        self.handlers_installed.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats (no locks required)
    ///
    /// # Note
    /// Values may not be perfectly consistent with each other due to concurrent updates,
    /// but each individual value is accurate. This is acceptable for monitoring.
    pub fn snapshot(&self) -> BridgeStats {
        let per_signal = self
            .per_signal
            .iter()
            .enumerate()
            .filter_map(|(number, slot)| {
                let count = slot.load(Ordering::Acquire);
                if count == 0 {
                    return None;
                }
                let signal = i32::try_from(number).ok().and_then(Signal::lookup)?;
                Some((signal, count))
            })
            .collect();

        BridgeStats {
            records_delivered: self.records_delivered.load(Ordering::Acquire),
            records_dropped: self.records_dropped.load(Ordering::Acquire),
            dumps_written: self.dumps_written.load(Ordering::Acquire),
            handlers_installed: self.handlers_installed.load(Ordering::Relaxed),
            per_signal,
        }
    }
}

impl Default for AtomicBridgeStats {
    fn default() -> Self {
        Self::new()
    }
}
