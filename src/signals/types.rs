/*!
 * Signal Types
 * Host signal definitions, classification and bridge state types
 */

use crate::core::errors::{BridgeError, BridgeResult};
use crate::core::limits::RECORD_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A host signal number
///
/// Named standard signals are associated constants carrying the host's own
/// numbers (on Linux `SIGUSR1` is 10, on macOS it is 30). Where the host has
/// real-time signals, every number in `SIGRTMIN()..=SIGRTMAX()` is valid too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Signal(i32);

impl Signal {
    /// Hangup detected on controlling terminal or death of controlling process
    pub const SIGHUP: Signal = Signal(libc::SIGHUP);
    /// Interrupt from keyboard (Ctrl+C)
    pub const SIGINT: Signal = Signal(libc::SIGINT);
    /// Quit from keyboard (Ctrl+\)
    pub const SIGQUIT: Signal = Signal(libc::SIGQUIT);
    /// Illegal instruction
    pub const SIGILL: Signal = Signal(libc::SIGILL);
    /// Trace/breakpoint trap
    pub const SIGTRAP: Signal = Signal(libc::SIGTRAP);
    /// Abort signal
    pub const SIGABRT: Signal = Signal(libc::SIGABRT);
    /// Bus error (bad memory access)
    pub const SIGBUS: Signal = Signal(libc::SIGBUS);
    /// Floating-point exception
    pub const SIGFPE: Signal = Signal(libc::SIGFPE);
    /// Kill signal (cannot be caught or ignored)
    pub const SIGKILL: Signal = Signal(libc::SIGKILL);
    /// User-defined signal 1
    pub const SIGUSR1: Signal = Signal(libc::SIGUSR1);
    /// Invalid memory reference
    pub const SIGSEGV: Signal = Signal(libc::SIGSEGV);
    /// User-defined signal 2
    pub const SIGUSR2: Signal = Signal(libc::SIGUSR2);
    /// Broken pipe
    pub const SIGPIPE: Signal = Signal(libc::SIGPIPE);
    /// Timer signal
    pub const SIGALRM: Signal = Signal(libc::SIGALRM);
    /// Termination signal
    pub const SIGTERM: Signal = Signal(libc::SIGTERM);
    /// Coprocessor stack fault
    #[cfg(all(
        any(target_os = "linux", target_os = "android"),
        not(any(target_arch = "mips", target_arch = "mips64", target_arch = "sparc64"))
    ))]
    pub const SIGSTKFLT: Signal = Signal(libc::SIGSTKFLT);
    /// Child process stopped or terminated
    pub const SIGCHLD: Signal = Signal(libc::SIGCHLD);
    /// Continue if stopped
    pub const SIGCONT: Signal = Signal(libc::SIGCONT);
    /// Stop process (cannot be caught or ignored)
    pub const SIGSTOP: Signal = Signal(libc::SIGSTOP);
    /// Stop typed at terminal (Ctrl+Z)
    pub const SIGTSTP: Signal = Signal(libc::SIGTSTP);
    /// Terminal input for background process
    pub const SIGTTIN: Signal = Signal(libc::SIGTTIN);
    /// Terminal output for background process
    pub const SIGTTOU: Signal = Signal(libc::SIGTTOU);
    /// Urgent condition on socket
    pub const SIGURG: Signal = Signal(libc::SIGURG);
    /// CPU time limit exceeded
    pub const SIGXCPU: Signal = Signal(libc::SIGXCPU);
    /// File size limit exceeded
    pub const SIGXFSZ: Signal = Signal(libc::SIGXFSZ);
    /// Virtual alarm clock
    pub const SIGVTALRM: Signal = Signal(libc::SIGVTALRM);
    /// Profiling timer expired
    pub const SIGPROF: Signal = Signal(libc::SIGPROF);
    /// Window resize signal
    pub const SIGWINCH: Signal = Signal(libc::SIGWINCH);
    /// I/O now possible
    pub const SIGIO: Signal = Signal(libc::SIGIO);
    /// Power failure
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub const SIGPWR: Signal = Signal(libc::SIGPWR);
    /// Bad system call
    pub const SIGSYS: Signal = Signal(libc::SIGSYS);

    /// Every named signal on this host; real-time signals are not listed
    pub const ALL: &'static [Signal] = &[
        Signal::SIGHUP,
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGILL,
        Signal::SIGTRAP,
        Signal::SIGABRT,
        Signal::SIGBUS,
        Signal::SIGFPE,
        Signal::SIGKILL,
        Signal::SIGUSR1,
        Signal::SIGSEGV,
        Signal::SIGUSR2,
        Signal::SIGPIPE,
        Signal::SIGALRM,
        Signal::SIGTERM,
        #[cfg(all(
            any(target_os = "linux", target_os = "android"),
            not(any(target_arch = "mips", target_arch = "mips64", target_arch = "sparc64"))
        ))]
        Signal::SIGSTKFLT,
        Signal::SIGCHLD,
        Signal::SIGCONT,
        Signal::SIGSTOP,
        Signal::SIGTSTP,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
        Signal::SIGURG,
        Signal::SIGXCPU,
        Signal::SIGXFSZ,
        Signal::SIGVTALRM,
        Signal::SIGPROF,
        Signal::SIGWINCH,
        Signal::SIGIO,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        Signal::SIGPWR,
        Signal::SIGSYS,
    ];

    /// Convert from signal number
    pub fn from_number(n: i32) -> BridgeResult<Self> {
        Self::lookup(n).ok_or(BridgeError::InvalidSignal(n))
    }

    /// Allocation-free lookup, usable from handler context
    #[inline]
    pub fn lookup(n: i32) -> Option<Self> {
        let mut i = 0;
        while i < Self::ALL.len() {
            if Self::ALL[i].0 == n {
                return Some(Self::ALL[i]);
            }
            i += 1;
        }
        is_realtime_number(n).then_some(Signal(n))
    }

    /// The `offset`-th real-time signal, counted from `SIGRTMIN`
    pub fn realtime(offset: i32) -> BridgeResult<Self> {
        let n = realtime_min().saturating_add(offset);
        if offset >= 0 && is_realtime_number(n) {
            Ok(Signal(n))
        } else {
            Err(BridgeError::InvalidSignal(n))
        }
    }

    /// Get signal number
    #[inline]
    pub fn number(&self) -> i32 {
        self.0
    }

    /// Inside the host's real-time range
    #[inline]
    pub fn is_realtime(&self) -> bool {
        is_realtime_number(self.0)
    }

    /// Check if signal can be caught/blocked
    pub fn can_catch(&self) -> bool {
        !matches!(*self, Signal::SIGKILL | Signal::SIGSTOP)
    }

    /// Default disposition terminates the process (with or without core)
    pub fn is_fatal(&self) -> bool {
        !matches!(
            *self,
            Signal::SIGCHLD
                | Signal::SIGCONT
                | Signal::SIGSTOP
                | Signal::SIGTSTP
                | Signal::SIGTTIN
                | Signal::SIGTTOU
                | Signal::SIGURG
                | Signal::SIGWINCH
        ) && !self.is_ignored_io()
    }

    /// Crash signals: synchronous faults and aborts whose default action dumps core.
    ///
    /// These are always re-raised with the default disposition after notifying,
    /// and they trigger the backtrace dump when it is enabled.
    pub fn is_crash(&self) -> bool {
        matches!(
            *self,
            Signal::SIGQUIT
                | Signal::SIGILL
                | Signal::SIGTRAP
                | Signal::SIGABRT
                | Signal::SIGBUS
                | Signal::SIGFPE
                | Signal::SIGSEGV
                | Signal::SIGSYS
        )
    }

    /// Asynchronous requests to shut down; subject to `TerminationPolicy`
    pub fn requests_shutdown(&self) -> bool {
        matches!(
            *self,
            Signal::SIGHUP | Signal::SIGINT | Signal::SIGTERM | Signal::SIGXCPU | Signal::SIGXFSZ
        )
    }

    // SIGIO is ignored by default on BSD-derived hosts and terminates on Linux
    fn is_ignored_io(&self) -> bool {
        *self == Signal::SIGIO && !cfg!(any(target_os = "linux", target_os = "android"))
    }

    /// Conventional name, e.g. "SIGSEGV"; "SIGRT" for any real-time signal
    pub fn name(&self) -> &'static str {
        match *self {
            Signal::SIGHUP => "SIGHUP",
            Signal::SIGINT => "SIGINT",
            Signal::SIGQUIT => "SIGQUIT",
            Signal::SIGILL => "SIGILL",
            Signal::SIGTRAP => "SIGTRAP",
            Signal::SIGABRT => "SIGABRT",
            Signal::SIGBUS => "SIGBUS",
            Signal::SIGFPE => "SIGFPE",
            Signal::SIGKILL => "SIGKILL",
            Signal::SIGUSR1 => "SIGUSR1",
            Signal::SIGSEGV => "SIGSEGV",
            Signal::SIGUSR2 => "SIGUSR2",
            Signal::SIGPIPE => "SIGPIPE",
            Signal::SIGALRM => "SIGALRM",
            Signal::SIGTERM => "SIGTERM",
            #[cfg(all(
                any(target_os = "linux", target_os = "android"),
                not(any(target_arch = "mips", target_arch = "mips64", target_arch = "sparc64"))
            ))]
            Signal::SIGSTKFLT => "SIGSTKFLT",
            Signal::SIGCHLD => "SIGCHLD",
            Signal::SIGCONT => "SIGCONT",
            Signal::SIGSTOP => "SIGSTOP",
            Signal::SIGTSTP => "SIGTSTP",
            Signal::SIGTTIN => "SIGTTIN",
            Signal::SIGTTOU => "SIGTTOU",
            Signal::SIGURG => "SIGURG",
            Signal::SIGXCPU => "SIGXCPU",
            Signal::SIGXFSZ => "SIGXFSZ",
            Signal::SIGVTALRM => "SIGVTALRM",
            Signal::SIGPROF => "SIGPROF",
            Signal::SIGWINCH => "SIGWINCH",
            Signal::SIGIO => "SIGIO",
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Signal::SIGPWR => "SIGPWR",
            Signal::SIGSYS => "SIGSYS",
            _ if self.is_realtime() => "SIGRT",
            _ => "SIG?",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match *self {
            Signal::SIGHUP => "Hangup",
            Signal::SIGINT => "Interrupt",
            Signal::SIGQUIT => "Quit",
            Signal::SIGILL => "Illegal instruction",
            Signal::SIGTRAP => "Trace/breakpoint trap",
            Signal::SIGABRT => "Aborted",
            Signal::SIGBUS => "Bus error",
            Signal::SIGFPE => "Floating point exception",
            Signal::SIGKILL => "Killed",
            Signal::SIGUSR1 => "User defined signal 1",
            Signal::SIGSEGV => "Segmentation fault",
            Signal::SIGUSR2 => "User defined signal 2",
            Signal::SIGPIPE => "Broken pipe",
            Signal::SIGALRM => "Alarm clock",
            Signal::SIGTERM => "Terminated",
            #[cfg(all(
                any(target_os = "linux", target_os = "android"),
                not(any(target_arch = "mips", target_arch = "mips64", target_arch = "sparc64"))
            ))]
            Signal::SIGSTKFLT => "Stack fault",
            Signal::SIGCHLD => "Child status changed",
            Signal::SIGCONT => "Continued",
            Signal::SIGSTOP => "Stopped (signal)",
            Signal::SIGTSTP => "Stopped",
            Signal::SIGTTIN => "Stopped (tty input)",
            Signal::SIGTTOU => "Stopped (tty output)",
            Signal::SIGURG => "Urgent I/O condition",
            Signal::SIGXCPU => "CPU time limit exceeded",
            Signal::SIGXFSZ => "File size limit exceeded",
            Signal::SIGVTALRM => "Virtual timer expired",
            Signal::SIGPROF => "Profiling timer expired",
            Signal::SIGWINCH => "Window size changed",
            Signal::SIGIO => "I/O possible",
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Signal::SIGPWR => "Power failure",
            Signal::SIGSYS => "Bad system call",
            _ if self.is_realtime() => "Real-time signal",
            _ => "Unknown signal",
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[inline]
fn realtime_min() -> i32 {
    libc::SIGRTMIN()
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
#[inline]
fn realtime_min() -> i32 {
    i32::MAX
}

// SIGRTMIN() already skips the numbers the C library keeps for itself
#[cfg(any(target_os = "linux", target_os = "android"))]
#[inline]
fn is_realtime_number(n: i32) -> bool {
    (libc::SIGRTMIN()..=libc::SIGRTMAX()).contains(&n)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
#[inline]
fn is_realtime_number(_n: i32) -> bool {
    false
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_realtime() {
            write!(f, "SIGRTMIN+{}({})", self.0 - realtime_min(), self.0)
        } else {
            write!(f, "{}({})", self.name(), self.0)
        }
    }
}

impl TryFrom<i32> for Signal {
    type Error = BridgeError;

    fn try_from(n: i32) -> BridgeResult<Self> {
        Self::from_number(n)
    }
}

/// What the OS currently does with a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDisposition {
    /// Default action for the signal
    Default,
    /// Ignore the signal
    Ignore,
    /// The bridge trampoline is installed
    Bridge,
    /// Some other handler is installed
    Foreign,
}

/// Installed-handler set entry as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallState {
    /// Trampoline active, previous handler saved
    Installed,
    /// Untouched by the bridge
    NotInstalled,
    /// The platform rejected the last attempt
    Failed(String),
}

/// Outcome of a successful install call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStatus {
    /// The trampoline was registered by this call
    Installed,
    /// The trampoline was already registered; nothing changed
    AlreadyInstalled,
}

/// What the trampoline does after notifying a shutdown request
///
/// Crash signals ignore this and always re-raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TerminationPolicy {
    /// Return from the handler; the consumer shuts the process down
    #[default]
    Notify = 0,
    /// Restore the default disposition and re-raise after notifying
    Reraise = 1,
}

impl TerminationPolicy {
    #[inline]
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => TerminationPolicy::Reraise,
            _ => TerminationPolicy::Notify,
        }
    }
}

impl FromStr for TerminationPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> BridgeResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notify" => Ok(TerminationPolicy::Notify),
            "reraise" => Ok(TerminationPolicy::Reraise),
            other => Err(BridgeError::InvalidConfig(format!(
                "unknown termination policy: {}",
                other
            ))),
        }
    }
}

/// One unit on the notification channel: the signal number, fixed-width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationRecord {
    number: i32,
}

impl NotificationRecord {
    /// Encoded size in bytes
    pub const SIZE: usize = RECORD_SIZE;

    pub const fn new(number: i32) -> Self {
        Self { number }
    }

    /// Wire form: native-endian i32
    #[inline(always)]
    pub const fn encode(self) -> [u8; RECORD_SIZE] {
        self.number.to_ne_bytes()
    }

    #[inline]
    pub const fn decode(bytes: [u8; RECORD_SIZE]) -> Self {
        Self {
            number: i32::from_ne_bytes(bytes),
        }
    }

    /// Raw signal number carried by the record
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Signal carried by the record, if the host knows it
    pub fn signal(&self) -> Option<Signal> {
        Signal::lookup(self.number)
    }
}

/// Bridge statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    pub records_delivered: u64,
    pub records_dropped: u64,
    pub dumps_written: u64,
    pub handlers_installed: usize,
    pub per_signal: Vec<(Signal, u64)>,
}

impl BridgeStats {
    /// Deliveries recorded for one signal
    pub fn delivered_for(&self, signal: Signal) -> u64 {
        self.per_signal
            .iter()
            .find(|(s, _)| *s == signal)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_follow_host() {
        assert_eq!(Signal::SIGUSR1.number(), libc::SIGUSR1);
        assert_eq!(Signal::SIGSEGV.number(), libc::SIGSEGV);
        assert_eq!(Signal::from_number(libc::SIGTERM).unwrap(), Signal::SIGTERM);
    }

    #[test]
    fn test_all_table_is_consistent() {
        for signal in Signal::ALL {
            assert_eq!(Signal::lookup(signal.number()), Some(*signal));
            assert!(!signal.is_realtime());
            assert_ne!(signal.name(), "SIGRT");
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn test_realtime_range_is_valid() {
        let first = Signal::realtime(0).unwrap();
        assert_eq!(first.number(), libc::SIGRTMIN());
        let last = Signal::from_number(libc::SIGRTMAX()).unwrap();
        assert!(last.is_realtime());

        let rt = Signal::realtime(2).unwrap();
        assert_eq!(Signal::lookup(libc::SIGRTMIN() + 2), Some(rt));
        assert!(rt.can_catch());
        assert!(rt.is_fatal());
        assert!(!rt.is_crash());
        assert!(!rt.requests_shutdown());
        assert_eq!(rt.name(), "SIGRT");
        assert_eq!(rt.to_string(), format!("SIGRTMIN+2({})", libc::SIGRTMIN() + 2));

        assert!(Signal::from_number(libc::SIGRTMAX() + 1).is_err());
        assert!(Signal::realtime(-1).is_err());
    }

    #[cfg(target_os = "linux")]
    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn test_stack_fault_is_named() {
        assert_eq!(Signal::from_number(libc::SIGSTKFLT).unwrap(), Signal::SIGSTKFLT);
        assert_eq!(Signal::SIGSTKFLT.name(), "SIGSTKFLT");
    }

    #[test]
    fn test_serializes_as_host_number() {
        let json = serde_json::to_string(&Signal::SIGTERM).unwrap();
        assert_eq!(json, libc::SIGTERM.to_string());
    }

    #[test]
    fn test_display_uses_name_and_number() {
        assert_eq!(
            Signal::SIGINT.to_string(),
            format!("SIGINT({})", libc::SIGINT)
        );
    }

    #[test]
    fn test_record_wire_form() {
        let record = NotificationRecord::new(libc::SIGUSR2);
        let bytes = record.encode();
        assert_eq!(bytes.len(), NotificationRecord::SIZE);
        assert_eq!(NotificationRecord::decode(bytes), record);
        assert_eq!(record.signal(), Some(Signal::SIGUSR2));
        assert_eq!(NotificationRecord::new(0).signal(), None);
    }

    #[test]
    fn test_termination_policy_parsing() {
        assert_eq!("Notify".parse::<TerminationPolicy>().unwrap(), TerminationPolicy::Notify);
        assert_eq!(" reraise ".parse::<TerminationPolicy>().unwrap(), TerminationPolicy::Reraise);
        assert_eq!(TerminationPolicy::from_u8(TerminationPolicy::Reraise as u8), TerminationPolicy::Reraise);
        assert_eq!(TerminationPolicy::from_u8(42), TerminationPolicy::Notify);
    }
}
