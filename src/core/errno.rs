/*!
 * Raw errno Access
 * Read and restore the thread's errno from handler context
 */

use libc::c_int;

#[cfg(any(target_os = "linux", target_os = "emscripten"))]
#[inline(always)]
fn location() -> *mut c_int {
    // SAFETY: always returns the calling thread's errno slot
    unsafe { libc::__errno_location() }
}

#[cfg(target_os = "android")]
#[inline(always)]
fn location() -> *mut c_int {
    // SAFETY: always returns the calling thread's errno slot
    unsafe { libc::__errno() }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
#[inline(always)]
fn location() -> *mut c_int {
    // SAFETY: always returns the calling thread's errno slot
    unsafe { libc::__error() }
}

/// Current errno of the calling thread
#[inline(always)]
pub fn get() -> c_int {
    // SAFETY: the slot is thread-local and valid for the thread's lifetime
    unsafe { *location() }
}

/// Overwrite errno of the calling thread
#[inline(always)]
pub fn set(value: c_int) {
    // SAFETY: see `get`
    unsafe { *location() = value }
}

/// Restores errno when dropped
///
/// The trampoline interrupts arbitrary code; whatever it does to errno must not
/// leak back into the interrupted thread.
pub struct ErrnoGuard(c_int);

impl ErrnoGuard {
    #[inline(always)]
    pub fn save() -> Self {
        Self(get())
    }
}

impl Drop for ErrnoGuard {
    #[inline(always)]
    fn drop(&mut self) {
        set(self.0);
    }
}
