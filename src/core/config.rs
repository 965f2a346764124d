/*!
 * Bridge Configuration
 *
 * Runtime configuration for the dump controller, termination policy and channel
 */

use super::errors::{BridgeError, BridgeResult};
use crate::signals::types::TerminationPolicy;
use serde::{Deserialize, Serialize};
use std::os::fd::RawFd;

/// Enables the crash dump ("1", "true", "on")
pub const ENV_BACKTRACE_DUMP: &str = "SIGBRIDGE_BACKTRACE_DUMP";
/// Descriptor the crash dump is written to
pub const ENV_DUMP_FD: &str = "SIGBRIDGE_DUMP_FD";
/// "notify" or "reraise"
pub const ENV_TERMINATION: &str = "SIGBRIDGE_TERMINATION";
/// Requested pipe capacity in bytes (Linux only)
pub const ENV_PIPE_CAPACITY: &str = "SIGBRIDGE_PIPE_CAPACITY";

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Write a raw backtrace when a crash signal arrives
    pub backtrace_dump: bool,
    /// Destination of the crash dump
    pub dump_fd: RawFd,
    /// What the trampoline does after notifying a shutdown request
    pub termination: TerminationPolicy,
    /// Capacity requested for bridge-created pipes
    pub pipe_capacity: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backtrace_dump: false,
            dump_fd: libc::STDERR_FILENO,
            termination: TerminationPolicy::Notify,
            pipe_capacity: None,
        }
    }
}

impl BridgeConfig {
    /// Build from SIGBRIDGE_* environment variables, falling back to defaults
    pub fn from_env() -> BridgeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn from_lookup<F>(lookup: F) -> BridgeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BACKTRACE_DUMP) {
            config.backtrace_dump = parse_flag(ENV_BACKTRACE_DUMP, &value)?;
        }

        if let Some(value) = lookup(ENV_DUMP_FD) {
            config.dump_fd = value.trim().parse::<RawFd>().ok().filter(|fd| *fd >= 0).ok_or_else(
                || BridgeError::InvalidConfig(format!("{}={} is not a descriptor", ENV_DUMP_FD, value)),
            )?;
        }

        if let Some(value) = lookup(ENV_TERMINATION) {
            config.termination = value.parse()?;
        }

        if let Some(value) = lookup(ENV_PIPE_CAPACITY) {
            let capacity = value.trim().parse::<usize>().map_err(|e| {
                BridgeError::InvalidConfig(format!("{}={}: {}", ENV_PIPE_CAPACITY, value, e))
            })?;
            config.pipe_capacity = Some(capacity);
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> BridgeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" | "" => Ok(false),
        other => Err(BridgeError::InvalidConfig(format!(
            "{}={} is not a boolean",
            key, other
        ))),
    }
}
