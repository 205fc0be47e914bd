//! Coordinator process entry point: binds the `Pipe` gRPC service and
//! serves it until shutdown.

mod dispatch;
mod metrics;
mod run_context;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use protocol::pipe_server::PipeServer;
use sync_api::config::LogFormat;
use sync_api::RunConfig;

use dispatch::Coordinator;
use run_context::RunContext;

/// Coordinator process: accepts worker connections and operator RPCs.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address the `Pipe` gRPC service binds to.
    #[arg(long, env = "SYNC_LISTEN_ADDR", default_value = "0.0.0.0:7000")]
    listen_addr: String,

    /// Log line format.
    #[arg(long, env = "SYNC_LOG_FORMAT", value_enum, default_value = "plain")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_utils::init(args.log_format).context("failed to initialize logging")?;

    let config = RunConfig {
        listen_addr: args.listen_addr.clone(),
        log_format: args.log_format,
        ..RunConfig::default()
    };

    let addr = config.listen_addr.parse().context("invalid listen address")?;
    let ctx = Arc::new(RunContext::new());
    let coordinator = Coordinator::new(Arc::clone(&ctx));

    tracing::info!(addr = %addr, "coordinator listening");

    let shutdown = ctx.shutdown.clone();
    tonic::transport::Server::builder()
        .add_service(PipeServer::new(coordinator))
        .serve_with_shutdown(addr, async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("coordinator server terminated with an error")?;

    Ok(())
}
