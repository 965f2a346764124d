/*!
 * Crash Dump
 * Raw frame addresses written from handler context, no symbolization
 */

use super::state;
use super::types::Signal;
use crate::core::limits::MAX_DUMP_FRAMES;
use crate::diagnostic::{emit_diagnostic_to, RawLine};

/// Marker opening every dump, useful for log scrapers
pub const DUMP_HEADER: &str = "*** signal-bridge: fatal signal ";

/// Write a backtrace of the interrupted thread to the dump descriptor.
///
/// Uses `backtrace::trace_unsynchronized`, which walks frames without taking
/// the crate's global lock and without resolving symbols. Every line is built
/// in a stack `RawLine`; nothing here allocates.
pub(crate) fn write_backtrace(signal: Signal) {
    let fd = state::dump_fd();

    let mut header = RawLine::new();
    header
        .push_byte(b'\n')
        .push_str(DUMP_HEADER)
        .push_signed(signal.number() as i64)
        .push_str(" (")
        .push_str(signal.name())
        .push_str("), backtrace:\n");
    emit_diagnostic_to(fd, header.as_bytes());

    let mut depth = 0usize;
    // SAFETY: frames are walked, never resolved; the synchronized variant takes a lock
    unsafe {
        backtrace::trace_unsynchronized(|frame| {
            let mut line = RawLine::new();
            line.push_str("  #")
                .push_decimal(depth as u64, 2)
                .push_str(" 0x")
                .push_hex(frame.ip() as usize)
                .push_byte(b'\n');
            emit_diagnostic_to(fd, line.as_bytes());
            depth += 1;
            depth < MAX_DUMP_FRAMES
        });
    }

    let mut footer = RawLine::new();
    footer
        .push_str("*** end of backtrace (")
        .push_decimal(depth as u64, 0)
        .push_str(" frames)\n");
    emit_diagnostic_to(fd, footer.as_bytes());

    state::STATS.record_dump();
}
