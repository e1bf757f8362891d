//! # Runtime Configuration Module
//!
//! Environment-driven tuning for the coroutine runtime.
//!
//! Dispatch limits (reply deadline, body cap) live in the config file and
//! its `VALET_*` overrides; see [`crate::config`].
//!
//! ## Environment Variables
//!
//! ### `VALET_STACK_SIZE`
//!
//! Stack size of each handler coroutine. Decimal (`65536`) or hex (`0x10000`).
//! Default: `0x10000` (64 KB).
//!
//! Every in-flight request holds one handler coroutine, so memory use is
//! roughly `stack_size × concurrent requests`.
//!
//! ## Usage
//!
//! ```rust
//! use valet::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```
//!
//! Unparseable values fall back to the default for that variable.

use std::env;

pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for handler coroutines in bytes
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let stack_size = lookup("VALET_STACK_SIZE")
            .and_then(|v| parse_size(&v))
            .unwrap_or(DEFAULT_STACK_SIZE);
        Self { stack_size }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}
