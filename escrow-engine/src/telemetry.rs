//! Tracing setup for binaries and integration harnesses

use std::str::FromStr;

use anyhow::anyhow;
use tracing::Level;

/// Installs a global fmt subscriber at `log_level` ("trace" .. "error").
pub fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let level = Level::from_str(log_level)
        .map_err(|_| anyhow!("unknown log level: {log_level}"))?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
