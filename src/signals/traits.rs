/*!
 * Signal Traits
 * Installer and channel-ownership abstractions
 */

use super::channel::{NotificationReceiver, NotifySender};
use super::types::{InstallState, InstallStatus, Signal, SignalDisposition};
use crate::core::errors::BridgeResult;
use std::os::fd::RawFd;

/// Registering and restoring the trampoline
pub trait SignalInstaller: Send + Sync {
    /// Install the trampoline for a signal number
    fn install(&self, signal_number: i32) -> BridgeResult<InstallStatus>;

    /// Restore the handler that was active before the bridge took over
    fn uninstall(&self, signal: Signal) -> BridgeResult<()>;

    /// Entry of the installed-handler set
    fn state(&self, signal: Signal) -> InstallState;

    /// What the OS currently does with the signal
    fn query(&self, signal_number: i32) -> BridgeResult<SignalDisposition>;

    /// Signals currently routed through the trampoline
    fn installed(&self) -> Vec<Signal>;
}

/// Ownership of the channel's write end
pub trait NotificationTarget: Send + Sync {
    /// Route notifications to a caller-owned descriptor
    fn set_notification_fd(&self, fd: RawFd) -> BridgeResult<()>;

    /// Route notifications to a write end the bridge now owns
    fn set_notification_sender(&self, sender: NotifySender) -> BridgeResult<()>;

    /// Stop routing; subsequent notifications are dropped
    fn clear_notification_fd(&self);

    /// Read end of the channel the bridge created itself, once
    fn take_receiver(&self) -> Option<NotificationReceiver>;
}
