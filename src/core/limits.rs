/*!
 * Bridge Limits and Constants
 *
 * Centralized location for the bounds used on the signal path and around it.
 * Values marked [SIGNAL-SAFE] are consulted from handler context and must stay
 * compile-time constants.
 */

use std::os::fd::RawFd;

// =============================================================================
// NOTIFICATION CHANNEL
// =============================================================================

/// Width of one notification record (a native-endian i32)
/// [SIGNAL-SAFE] Well below PIPE_BUF, so a single write is atomic on pipes
pub const RECORD_SIZE: usize = 4;

/// Sentinel stored in the write-end cell when no descriptor is active
pub const NO_FD: RawFd = -1;

/// EINTR retries for the trampoline's single record write
/// [SIGNAL-SAFE]
pub const NOTIFY_WRITE_RETRIES: usize = 4;

/// Retired bridge-owned write ends kept open after a swap
/// An in-flight handler may still hold the old descriptor number
pub const MAX_RETIRED_ENDPOINTS: usize = 16;

/// Records read per batch by `NotificationReceiver::drain`
pub const DRAIN_BATCH_RECORDS: usize = 256;

// =============================================================================
// SIGNAL TABLE
// =============================================================================

/// Upper bound (exclusive) on signal numbers tracked by the per-signal counters
pub const SIGNAL_SLOTS: usize = 65;

// =============================================================================
// DIAGNOSTICS AND DUMPS
// =============================================================================

/// Capacity of a stack-allocated diagnostic line
/// [SIGNAL-SAFE]
pub const RAW_LINE_CAPACITY: usize = 256;

/// Write attempts before a diagnostic is truncated
/// [SIGNAL-SAFE]
pub const DIAGNOSTIC_WRITE_ATTEMPTS: usize = 16;

/// Milliseconds to wait for a backpressured diagnostic stream per attempt
/// [SIGNAL-SAFE]
pub const DIAGNOSTIC_POLL_TIMEOUT_MS: i32 = 50;

/// Deepest stack frame written by the crash dump
/// [SIGNAL-SAFE]
pub const MAX_DUMP_FRAMES: usize = 128;
