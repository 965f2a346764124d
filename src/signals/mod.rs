/*!
 * Signals Module
 * Signal interception: installer, trampoline, notification channel and dump path
 */

mod atomic_stats;
pub mod channel;
mod dump;
mod installer;
pub mod state;
pub mod traits;
mod trampoline;
pub mod types;

// Re-export public API
pub use atomic_stats::AtomicBridgeStats;
pub use channel::{
    pipe_capacity, AsyncNotificationReceiver, NotificationChannel, NotificationReceiver, NotifySender,
};
pub use dump::DUMP_HEADER;
pub use installer::SignalRegistry;
pub use traits::*;
pub use trampoline::reraises;
pub use types::{
    BridgeStats, InstallState, InstallStatus, NotificationRecord, Signal, SignalDisposition,
    TerminationPolicy,
};
