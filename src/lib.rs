/*!
 * Signal Bridge Library
 * Async-signal-safe signal interception for managed runtimes
 *
 * A trampoline registered with sigaction(2) turns each delivery into a
 * fixed-size record on a non-blocking pipe; all real handling happens on the
 * consumer side of that pipe.
 */

#![cfg(unix)]

pub mod bridge;
pub mod core;
pub mod diagnostic;
pub mod ffi;
pub mod monitoring;
pub mod signals;

// Re-exports
pub use bridge::{
    apply_config, backtrace_dump_enabled, clear_notification_fd, emit_diagnostic, emit_diagnostic_to,
    install_signal_action, install_state, installed_signals, query_signal_action, registry,
    set_backtrace_dump_enabled, set_backtrace_dump_fd, set_notification_fd, set_notification_sender,
    set_termination_policy, stats, take_receiver, termination_policy, uninstall_signal_action,
};
pub use crate::core::{BridgeConfig, BridgeError, BridgeResult};
pub use diagnostic::RawLine;
pub use monitoring::init_tracing;
pub use signals::{
    AsyncNotificationReceiver, BridgeStats, InstallState, InstallStatus, NotificationChannel,
    NotificationReceiver, NotificationRecord, NotifySender, Signal, SignalDisposition,
    TerminationPolicy, DUMP_HEADER,
};
