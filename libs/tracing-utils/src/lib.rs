//! Process-wide logging setup, called exactly once from each binary's
//! `main` of both the coordinator and worker binaries.

use anyhow::Context;
use sync_api::config::LogFormat;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber.
///
/// The filter directive comes from `SYNC_LOG`, falling back to `RUST_LOG`,
/// falling back to `info`. `format` selects between a compact human-readable
/// writer (`Plain`) and one-line-per-event JSON (`Json`) for log
/// aggregation pipelines.
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("SYNC_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Plain => builder
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))
            .context("failed to install plain-text tracing subscriber"),
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))
            .context("failed to install json tracing subscriber"),
    }
}
