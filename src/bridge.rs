/*!
 * Bridge Entry Points
 *
 * The process-wide surface a managed runtime talks to. One static registry
 * backs every call; handler-visible state lives in `signals::state`.
 */

use crate::core::config::BridgeConfig;
use crate::core::errors::BridgeResult;
use crate::signals::state;
use crate::signals::{
    BridgeStats, InstallState, InstallStatus, NotificationReceiver, NotificationTarget, NotifySender,
    Signal, SignalDisposition, SignalInstaller, SignalRegistry, TerminationPolicy,
};
use std::os::fd::RawFd;
use tracing::info;

pub use crate::diagnostic::{emit_diagnostic, emit_diagnostic_to};

static REGISTRY: SignalRegistry = SignalRegistry::new();

/// The process-wide installer
pub fn registry() -> &'static SignalRegistry {
    &REGISTRY
}

/// Route `signal_number` through the trampoline.
///
/// The first successful call creates the notification channel unless a write
/// end was configured before; collect its read end with `take_receiver`.
pub fn install_signal_action(signal_number: i32) -> BridgeResult<InstallStatus> {
    REGISTRY.install(signal_number)
}

/// Put back the handler that was active before the bridge took the signal
pub fn uninstall_signal_action(signal: Signal) -> BridgeResult<()> {
    REGISTRY.uninstall(signal)
}

/// Report the OS disposition without changing it
pub fn query_signal_action(signal_number: i32) -> BridgeResult<SignalDisposition> {
    REGISTRY.query(signal_number)
}

/// Installed-handler set entry for one signal
pub fn install_state(signal: Signal) -> InstallState {
    REGISTRY.state(signal)
}

/// Signals currently routed through the trampoline
pub fn installed_signals() -> Vec<Signal> {
    REGISTRY.installed()
}

/// Route notifications to a caller-owned descriptor.
///
/// The descriptor is switched to non-blocking mode. The bridge never closes it;
/// the caller must keep it open until another write end replaces it.
pub fn set_notification_fd(fd: RawFd) -> BridgeResult<()> {
    REGISTRY.set_notification_fd(fd)
}

/// Route notifications to a write end the bridge takes ownership of
pub fn set_notification_sender(sender: NotifySender) -> BridgeResult<()> {
    REGISTRY.set_notification_sender(sender)
}

/// Detach the write end; notifications are dropped until a new one is set
pub fn clear_notification_fd() {
    REGISTRY.clear_notification_fd()
}

/// Read end of the channel created by the first install, handed out once
pub fn take_receiver() -> Option<NotificationReceiver> {
    REGISTRY.take_receiver()
}

/// Enable or disable the crash dump
pub fn set_backtrace_dump_enabled(enabled: bool) {
    state::set_backtrace_dump(enabled);
}

pub fn backtrace_dump_enabled() -> bool {
    state::backtrace_dump_enabled()
}

/// Choose where the crash dump goes (standard error by default)
pub fn set_backtrace_dump_fd(fd: RawFd) {
    state::set_dump_fd(fd);
}

pub fn set_termination_policy(policy: TerminationPolicy) {
    state::set_termination_policy(policy);
}

pub fn termination_policy() -> TerminationPolicy {
    state::termination_policy()
}

/// Store every configurable cell at once
pub fn apply_config(config: &BridgeConfig) {
    state::set_backtrace_dump(config.backtrace_dump);
    state::set_dump_fd(config.dump_fd);
    state::set_termination_policy(config.termination);
    REGISTRY.set_pipe_capacity(config.pipe_capacity);

    info!(
        backtrace_dump = config.backtrace_dump,
        dump_fd = config.dump_fd,
        termination = ?config.termination,
        pipe_capacity = ?config.pipe_capacity,
        "Applied bridge configuration"
    );
}

/// Snapshot of the trampoline counters
pub fn stats() -> BridgeStats {
    state::STATS.snapshot()
}
