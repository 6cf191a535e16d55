//! Log subscriber setup. Logs go to stderr so command output on stdout stays parseable.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Parse a filter directive such as `warn` or `opchain_core=trace,info`.
pub fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).with_context(|| format!("invalid log filter `{directive}`"))
}

/// Install the global fmt subscriber. Fails if one is already installed.
pub fn init(directive: &str) -> Result<()> {
    let filter = parse_filter(directive)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("warn").is_ok());
        assert!(parse_filter("opchain_core=trace,info").is_ok());

        let err = parse_filter("opchain_core=loud").unwrap_err();
        assert!(err.to_string().contains("invalid log filter"));
    }
}
