//! Environment variable parsing helpers.
//!
//! ```
//! use opchain_types::env_utils::{env_bool, env_var_or};
//!
//! let max_inputs: usize = env_var_or("OPCHAIN_MAX_INPUTS", 100_000);
//! let deny_unknown = env_bool("OPCHAIN_DENY_UNKNOWN");
//! # let _ = (max_inputs, deny_unknown);
//! ```

use std::str::FromStr;

/// Parse an environment variable. `None` if unset or unparsable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Whether `value` spells a truthy flag: "1", "true", "yes" or "on" (case-insensitive).
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Whether an environment variable is set to a truthy value.
pub fn env_bool(key: &str) -> bool {
    std::env::var(key).map(|v| is_truthy(&v)).unwrap_or(false)
}

pub fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
