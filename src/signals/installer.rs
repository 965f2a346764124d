/*!
 * Signal Action Installer
 * Installed-handler set, saved original actions and write-end ownership
 */

use super::channel::{set_nonblocking, NotificationChannel, NotificationReceiver, NotifySender};
use super::state;
use super::traits::{NotificationTarget, SignalInstaller};
use super::trampoline::{self, SavedAction};
use super::types::{InstallState, InstallStatus, Signal, SignalDisposition};
use crate::core::errors::{BridgeError, BridgeResult};
use crate::core::limits::MAX_RETIRED_ENDPOINTS;
use crate::monitoring::span_operation;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::os::fd::{AsRawFd, RawFd};
use tracing::{debug, info, warn};

/// One entry of the installed-handler set
enum HandlerEntry {
    /// Trampoline active; `previous` is what the OS had before the first install
    Installed { previous: SavedAction },
    /// The platform refused the last attempt; the old handler is untouched
    Failed { reason: String },
}

/// Whatever the write-end cell currently points at
enum WriteEnd {
    None,
    /// Created by or handed to the bridge; closed only after retirement
    Owned(NotifySender),
    /// Caller keeps ownership and must keep it open while published
    Borrowed(RawFd),
}

impl WriteEnd {
    fn raw_fd(&self) -> Option<RawFd> {
        match self {
            WriteEnd::None => None,
            WriteEnd::Owned(sender) => Some(sender.as_raw_fd()),
            WriteEnd::Borrowed(fd) => Some(*fd),
        }
    }
}

struct RegistryInner {
    handlers: BTreeMap<Signal, HandlerEntry>,
    write_end: WriteEnd,
    /// Set once any write end has been published, by the bridge or a caller
    endpoint_configured: bool,
    retired: VecDeque<NotifySender>,
    receiver: Option<NotificationReceiver>,
    pipe_capacity: Option<usize>,
}

impl RegistryInner {
    /// Swap the published write end in one atomic store
    fn publish(&mut self, next: WriteEnd) {
        let current = next.raw_fd();
        let previous = state::swap_notify_fd(current);
        let old = std::mem::replace(&mut self.write_end, next);
        self.endpoint_configured = true;

        if let WriteEnd::Owned(sender) = old {
            self.retire(sender);
        }

        debug!(?previous, ?current, "Swapped notification write end");
    }

    /// Undo the channel created by a failed first install.
    ///
    /// No handler was ever live while it was published, so it is closed on the
    /// spot instead of being retired.
    fn rollback_channel(&mut self) {
        state::swap_notify_fd(None);
        self.write_end = WriteEnd::None;
        self.receiver = None;
        self.endpoint_configured = false;
        debug!("Rolled back notification channel");
    }

    /// Park an owned write end; a handler may still be writing to its number
    fn retire(&mut self, sender: NotifySender) {
        self.retired.push_back(sender);
        while self.retired.len() > MAX_RETIRED_ENDPOINTS {
            if let Some(oldest) = self.retired.pop_front() {
                debug!(fd = oldest.as_raw_fd(), "Closing retired write end");
            }
        }
    }
}

/// Registers the trampoline for one signal, returning the replaced action
type RegisterFn = fn(Signal) -> nix::Result<SavedAction>;

/// Process-wide installer
///
/// Setup-path operations serialize on one mutex. The trampoline never touches
/// it: everything the handler needs is published through `state`.
pub struct SignalRegistry {
    inner: Mutex<RegistryInner>,
    register: RegisterFn,
}

impl SignalRegistry {
    pub const fn new() -> Self {
        Self::with_register(trampoline::register)
    }

    const fn with_register(register: RegisterFn) -> Self {
        Self {
            register,
            inner: Mutex::new(RegistryInner {
                handlers: BTreeMap::new(),
                write_end: WriteEnd::None,
                endpoint_configured: false,
                retired: VecDeque::new(),
                receiver: None,
                pipe_capacity: None,
            }),
        }
    }

    /// Capacity requested for the channel the bridge creates on first install
    pub fn set_pipe_capacity(&self, capacity: Option<usize>) {
        self.inner.lock().pipe_capacity = capacity;
    }

    /// Number of retired write ends still open
    pub fn retired_endpoints(&self) -> usize {
        self.inner.lock().retired.len()
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalInstaller for SignalRegistry {
    fn install(&self, signal_number: i32) -> BridgeResult<InstallStatus> {
        let signal = Signal::from_number(signal_number).inspect_err(|_| {
            warn!(signal_number, "Refusing to install handler for unknown signal");
        })?;

        if !signal.can_catch() {
            warn!(%signal, "Refusing to install handler for uncatchable signal");
            return Err(BridgeError::Uncatchable(signal));
        }

        let span = span_operation("install_signal_action");
        span.record("signal", signal.name());

        let mut inner = self.inner.lock();

        // Registering twice would save the trampoline over the real original
        if let Some(HandlerEntry::Installed { .. }) = inner.handlers.get(&signal) {
            debug!(%signal, "Signal already routed through the bridge");
            span.record_result(true);
            return Ok(InstallStatus::AlreadyInstalled);
        }

        // The write end is published before the handler goes live
        let created_channel = if !inner.endpoint_configured {
            let (sender, receiver) = NotificationChannel::open_with_capacity(inner.pipe_capacity)
                .inspect_err(|e| span.record_error(&e.to_string()))?;
            inner.receiver = Some(receiver);
            inner.publish(WriteEnd::Owned(sender));
            true
        } else {
            false
        };

        match (self.register)(signal) {
            Ok(previous) => {
                inner.handlers.insert(signal, HandlerEntry::Installed { previous });
                state::STATS.inc_handlers();
                span.record_result(true);
                info!(%signal, created_channel, "Installed signal trampoline");
                Ok(InstallStatus::Installed)
            }
            Err(errno) => {
                let reason = errno.desc().to_string();
                if created_channel {
                    inner.rollback_channel();
                }
                inner.handlers.insert(
                    signal,
                    HandlerEntry::Failed {
                        reason: reason.clone(),
                    },
                );
                span.record_error(&reason);
                warn!(%signal, %reason, "Platform rejected signal handler");
                Err(BridgeError::InstallRejected { signal, reason })
            }
        }
    }

    fn uninstall(&self, signal: Signal) -> BridgeResult<()> {
        let mut inner = self.inner.lock();

        let restored = match inner.handlers.get(&signal) {
            Some(HandlerEntry::Installed { previous }) => trampoline::restore(signal, previous),
            _ => return Err(BridgeError::NotInstalled(signal)),
        };
        restored.map_err(|errno| BridgeError::InstallRejected {
            signal,
            reason: errno.desc().to_string(),
        })?;

        inner.handlers.remove(&signal);
        state::STATS.dec_handlers();
        info!(%signal, "Restored original signal handler");
        Ok(())
    }

    fn state(&self, signal: Signal) -> InstallState {
        match self.inner.lock().handlers.get(&signal) {
            Some(HandlerEntry::Installed { .. }) => InstallState::Installed,
            Some(HandlerEntry::Failed { reason }) => InstallState::Failed(reason.clone()),
            None => InstallState::NotInstalled,
        }
    }

    fn query(&self, signal_number: i32) -> BridgeResult<SignalDisposition> {
        let signal = Signal::from_number(signal_number)?;
        let handler = trampoline::current_handler(signal)
            .map_err(|errno| BridgeError::Io(errno.desc().to_string()))?;

        Ok(match handler {
            libc::SIG_DFL => SignalDisposition::Default,
            libc::SIG_IGN => SignalDisposition::Ignore,
            h if h == trampoline::trampoline_address() => SignalDisposition::Bridge,
            _ => SignalDisposition::Foreign,
        })
    }

    fn installed(&self) -> Vec<Signal> {
        self.inner
            .lock()
            .handlers
            .iter()
            .filter(|(_, entry)| matches!(entry, HandlerEntry::Installed { .. }))
            .map(|(signal, _)| *signal)
            .collect()
    }
}

impl NotificationTarget for SignalRegistry {
    fn set_notification_fd(&self, fd: RawFd) -> BridgeResult<()> {
        if fd < 0 {
            return Err(BridgeError::InvalidDescriptor(fd));
        }
        set_nonblocking(fd).map_err(|errno| {
            warn!(fd, error = %errno, "Rejected notification descriptor");
            BridgeError::InvalidDescriptor(fd)
        })?;

        self.inner.lock().publish(WriteEnd::Borrowed(fd));
        info!(fd, "Routing notifications to caller descriptor");
        Ok(())
    }

    fn set_notification_sender(&self, sender: NotifySender) -> BridgeResult<()> {
        let fd = sender.as_raw_fd();
        self.inner.lock().publish(WriteEnd::Owned(sender));
        info!(fd, "Routing notifications to bridge-owned descriptor");
        Ok(())
    }

    fn clear_notification_fd(&self) {
        self.inner.lock().publish(WriteEnd::None);
        info!("Notification routing cleared; signals will be dropped");
    }

    fn take_receiver(&self) -> Option<NotificationReceiver> {
        self.inner.lock().receiver.take()
    }
}
