//! Runtime settings for the `opchain` binary.
//!
//! Settings come from the environment first, then CLI flags override them:
//!
//! | Variable               | Meaning                                   | Default  |
//! |------------------------|-------------------------------------------|----------|
//! | `OPCHAIN_LOG`          | tracing filter directive                  | `warn`   |
//! | `OPCHAIN_DENY_UNKNOWN` | `check` fails on unresolved signatures    | off      |
//! | `OPCHAIN_MAX_INPUTS`   | maximum input values accepted by `run`    | `100000` |

use opchain_types::env_utils::{env_bool, env_string_or, env_var_or, is_truthy};

pub const LOG_ENV: &str = "OPCHAIN_LOG";
pub const DENY_UNKNOWN_ENV: &str = "OPCHAIN_DENY_UNKNOWN";
pub const MAX_INPUTS_ENV: &str = "OPCHAIN_MAX_INPUTS";

pub const DEFAULT_LOG_FILTER: &str = "warn";
pub const DEFAULT_MAX_INPUTS: usize = 100_000;

/// Filter used for `-v/--verbose` when no explicit `--log` is given.
pub const VERBOSE_LOG_FILTER: &str = "debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log_filter: String,
    pub deny_unknown: bool,
    pub max_inputs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            deny_unknown: false,
            max_inputs: DEFAULT_MAX_INPUTS,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self {
            log_filter: env_string_or(LOG_ENV, DEFAULT_LOG_FILTER),
            deny_unknown: env_bool(DENY_UNKNOWN_ENV),
            max_inputs: env_var_or(MAX_INPUTS_ENV, DEFAULT_MAX_INPUTS),
        }
    }

    /// Read settings through an arbitrary lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            log_filter: lookup(LOG_ENV).unwrap_or(defaults.log_filter),
            deny_unknown: lookup(DENY_UNKNOWN_ENV).is_some_and(|v| is_truthy(&v)),
            max_inputs: lookup(MAX_INPUTS_ENV)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_inputs),
        }
    }

    /// Apply CLI flags. An explicit `--log` beats `--verbose`, which beats the environment.
    pub fn with_overrides(mut self, log: Option<&str>, verbose: bool, deny_unknown: bool) -> Self {
        if let Some(filter) = log {
            self.log_filter = filter.to_string();
        } else if verbose {
            self.log_filter = VERBOSE_LOG_FILTER.to_string();
        }
        self.deny_unknown |= deny_unknown;
        self
    }
}
