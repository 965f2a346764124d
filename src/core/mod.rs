/*!
 * Core Module
 * Error handling, configuration and shared limits
 */

pub mod config;
pub mod errno;
pub mod errors;
pub mod limits;

// Re-export for convenience
pub use config::BridgeConfig;
pub use errors::*;
