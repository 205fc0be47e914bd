use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_PART_SIZE, MAX_BLOCK_SIZE};

/// `SYNC_LOG_FORMAT` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Process-wide configuration, built exactly once at start-up from CLI
/// flags with environment-variable fallback (`clap`'s `env` feature) and
/// never re-read afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub coordinator_addr: String,
    pub listen_addr: String,
    pub worker_concurrency: usize,
    pub part_size_bytes: u64,
    pub max_block_bytes: u64,
    pub rate_limit_bytes_per_sec: Option<u64>,
    pub log_format: LogFormat,
    pub idle_backoff: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            coordinator_addr: "http://127.0.0.1:7000".to_string(),
            listen_addr: "0.0.0.0:7000".to_string(),
            worker_concurrency: 16,
            part_size_bytes: DEFAULT_PART_SIZE,
            max_block_bytes: MAX_BLOCK_SIZE,
            rate_limit_bytes_per_sec: None,
            log_format: LogFormat::Plain,
            idle_backoff: crate::WORKER_IDLE_BACKOFF,
        }
    }
}
