/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::signals::types::Signal;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bridge operation result
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Status code returned across the C ABI for a successful install
pub const STATUS_OK: i32 = 0;
/// Status code for an install on a signal the bridge already owns
pub const STATUS_ALREADY_INSTALLED: i32 = 1;
/// Status code for unknown or uncatchable signal numbers
pub const STATUS_INVALID_SIGNAL: i32 = -1;
/// Status code for a registration the platform refused
pub const STATUS_REJECTED: i32 = -2;
/// Status code for notification channel failures
pub const STATUS_CHANNEL: i32 = -3;
/// Status code for everything else
pub const STATUS_OTHER: i32 = -4;

/// Errors surfaced synchronously by the installer, the channel and the controller.
///
/// Nothing on the signal-handler path produces one of these; failures there are
/// absorbed (dropped notification) or become the signal's own default effect.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum BridgeError {
    #[error("Invalid signal: {0}")]
    #[diagnostic(
        code(bridge::invalid_signal),
        help("The number does not name a signal on this host. Use the libc constants.")
    )]
    InvalidSignal(i32),

    #[error("Signal {0} cannot be caught")]
    #[diagnostic(
        code(bridge::uncatchable),
        help("SIGKILL and SIGSTOP are handled by the kernel and never reach user space.")
    )]
    Uncatchable(Signal),

    #[error("Installation rejected for {signal}: {reason}")]
    #[diagnostic(
        code(bridge::install_rejected),
        help("The platform refused sigaction(2). The previous handler is still active.")
    )]
    InstallRejected { signal: Signal, reason: String },

    #[error("Signal {0} is not installed by the bridge")]
    #[diagnostic(
        code(bridge::not_installed),
        help("Only signals installed through install_signal_action can be restored.")
    )]
    NotInstalled(Signal),

    #[error("Notification channel setup failed: {0}")]
    #[diagnostic(
        code(bridge::channel_setup),
        help("Creating or configuring the notification pipe failed. Check descriptor limits.")
    )]
    ChannelSetup(String),

    #[error("Invalid descriptor: {0}")]
    #[diagnostic(
        code(bridge::invalid_descriptor),
        help("The descriptor is closed or was never opened in this process.")
    )]
    InvalidDescriptor(i32),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(bridge::invalid_config),
        help("Review the SIGBRIDGE_* environment variables or the JSON configuration.")
    )]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(bridge::io_error))]
    Io(String),
}

impl BridgeError {
    /// Whether the failure belongs to the invalid-signal class
    pub fn is_invalid_signal(&self) -> bool {
        matches!(self, BridgeError::InvalidSignal(_) | BridgeError::Uncatchable(_))
    }

    /// Map onto the integer status codes of the C entry points
    pub fn status_code(&self) -> i32 {
        match self {
            BridgeError::InvalidSignal(_) | BridgeError::Uncatchable(_) => STATUS_INVALID_SIGNAL,
            BridgeError::InstallRejected { .. } => STATUS_REJECTED,
            BridgeError::ChannelSetup(_) | BridgeError::InvalidDescriptor(_) => STATUS_CHANNEL,
            BridgeError::NotInstalled(_) | BridgeError::InvalidConfig(_) | BridgeError::Io(_) => {
                STATUS_OTHER
            }
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidConfig(err.to_string())
    }
}
