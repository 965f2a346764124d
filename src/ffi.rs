/*!
 * C Entry Points
 * The bridge surface for runtimes that link it as a native library
 */

use crate::bridge;
use crate::core::errors::{STATUS_ALREADY_INSTALLED, STATUS_OK};
use crate::signals::InstallStatus;
use libc::{c_char, c_int};
use std::ffi::CStr;
use tracing::warn;

/// Write a NUL-terminated string straight to standard error
///
/// # Safety
/// `text` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn sigbridge_print_str(text: *const c_char) {
    if text.is_null() {
        return;
    }
    // SAFETY: guaranteed by the caller
    let bytes = unsafe { CStr::from_ptr(text) }.to_bytes();
    bridge::emit_diagnostic_to(libc::STDERR_FILENO, bytes);
}

/// Install the trampoline for `signum`.
///
/// Returns 0 on success, 1 if already installed, -1 for an invalid or
/// uncatchable signal, -2 if the platform rejected it, -3 if the channel could
/// not be created.
#[no_mangle]
pub extern "C" fn sigbridge_signal_action(signum: c_int) -> c_int {
    match bridge::install_signal_action(signum) {
        Ok(InstallStatus::Installed) => STATUS_OK,
        Ok(InstallStatus::AlreadyInstalled) => STATUS_ALREADY_INSTALLED,
        Err(e) => e.status_code(),
    }
}

/// Route notifications to `fd`; a negative value detaches.
///
/// Returns 0 on success or -3 when `fd` is not an open descriptor.
#[no_mangle]
pub extern "C" fn sigbridge_set_fd(fd: c_int) -> c_int {
    if fd < 0 {
        bridge::clear_notification_fd();
        return STATUS_OK;
    }
    match bridge::set_notification_fd(fd) {
        Ok(()) => STATUS_OK,
        Err(e) => {
            warn!(fd, error = %e, "sigbridge_set_fd failed");
            e.status_code()
        }
    }
}

/// Enable or disable the crash dump
#[no_mangle]
pub extern "C" fn sigbridge_set_backtrace_dump(enable: bool) {
    bridge::set_backtrace_dump_enabled(enable);
}
