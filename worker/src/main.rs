//! Worker process entry point: pulls batches from the coordinator
//! over a single persistent `DataStream`, executes them, and reports
//! results back.

mod execute;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use protocol::pipe_client::PipeClient;
use protocol::{Empty, PutResultRequest, Signal};
use storage::registry::Registry;
use sync_api::config::LogFormat;
use sync_api::RunConfig;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use transfer::TransferEngine;

/// Worker process: connects to a coordinator and executes the batches it
/// is handed.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Coordinator address to dial.
    #[arg(long, env = "SYNC_COORDINATOR_ADDR", default_value = "http://127.0.0.1:7000")]
    coordinator_addr: String,

    /// Concurrent in-flight transfer permits.
    #[arg(long, default_value_t = 16)]
    worker_concurrency: usize,

    /// Optional egress rate limit in bytes/sec.
    #[arg(long, env = "SYNC_RATE_LIMIT_BYTES_PER_SEC")]
    rate_limit_bytes_per_sec: Option<u64>,

    /// Log line format.
    #[arg(long, env = "SYNC_LOG_FORMAT", value_enum, default_value = "plain")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_utils::init(args.log_format).context("failed to initialize logging")?;

    let config = RunConfig {
        coordinator_addr: args.coordinator_addr.clone(),
        worker_concurrency: args.worker_concurrency,
        rate_limit_bytes_per_sec: args.rate_limit_bytes_per_sec,
        log_format: args.log_format,
        ..RunConfig::default()
    };

    let worker_id = local_ip_address::local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::info!(worker_id = %worker_id, coordinator = %config.coordinator_addr, "worker starting");

    let mut client = PipeClient::connect(config.coordinator_addr.clone())
        .await
        .context("failed to connect to coordinator")?;

    let (signal_tx, signal_rx) = mpsc::channel(1);
    let mut task_stream = client
        .data_stream(ReceiverStream::new(signal_rx))
        .await
        .context("failed to open data stream")?
        .into_inner();

    let closing = Arc::new(AtomicBool::new(false));
    {
        let closing = Arc::clone(&closing);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, closing after current task");
            closing.store(true, Ordering::SeqCst);
        });
    }

    let engine = Arc::new(TransferEngine::new(&config));
    let registry = Registry::new();

    loop {
        let sign = if closing.load(Ordering::SeqCst) { "close" } else { "free" };
        if signal_tx.send(Signal { sign: sign.to_string() }).await.is_err() {
            tracing::warn!("signal channel closed, exiting");
            break;
        }

        let envelope = match task_stream.message().await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                tracing::info!("data stream ended, exiting");
                break;
            }
            Err(status) => {
                tracing::error!(error = %protocol::describe_status(&status), "data stream error");
                break;
            }
        };

        let Some(task) = envelope.task else {
            tracing::info!("received nil task, exiting");
            break;
        };
        let task: sync_api::Task = match task.try_into() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "malformed task envelope");
                continue;
            }
        };

        let bucket_name = task.bucket_name.clone();
        let outcome = execute::execute(&task, &engine, &registry).await;
        match outcome {
            Ok(outcome) => {
                if !outcome.success.is_empty() || !outcome.failed.is_empty() {
                    let request = PutResultRequest {
                        bucket_name,
                        worker_id: worker_id.clone(),
                        success: outcome.success,
                        failed: outcome.failed,
                        bytes_delta: outcome.bytes_delta,
                    };
                    if let Err(status) = client.put_result(request).await {
                        tracing::error!(error = %protocol::describe_status(&status), "put_result failed");
                    }
                }
            }
            Err(e) => {
                tracing::error!(bucket = %bucket_name, error = %e, "task execution failed outright");
            }
        }

        let has_more = client
            .has_more(Empty {})
            .await
            .map(|r| r.into_inner().has)
            .unwrap_or(false);
        if !has_more {
            tokio::time::sleep(config.idle_backoff).await;
        }
    }

    Ok(())
}
