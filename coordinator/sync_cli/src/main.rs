//! Operator CLI: submits sync plans and watches progress against a
//! running coordinator.

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use protocol::pipe_client::PipeClient;
use protocol::{Empty, SyncRequest};
use sync_api::AccountUri;

#[derive(Parser, Debug)]
#[command(name = "sync_cli", version, about = "Operator CLI for the bucket-sync coordinator")]
struct Cli {
    /// Coordinator address to dial.
    #[arg(long, env = "SYNC_COORDINATOR_ADDR", default_value = "http://127.0.0.1:7000")]
    coordinator_addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a sync plan and print the computed bucket pairing.
    Sync {
        /// `<access>:<secret>@<type>://<region>`
        src_uri: String,
        /// `<access>:<secret>@<type>://<region>`
        dest_uri: String,
    },
    /// Begin execution and display live totals until every bucket finishes.
    Start,
    /// Display current per-bucket and aggregate progress.
    Stat,
    /// Reserved; currently a no-op.
    Stop,
    /// Print the build version.
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {e:#}", style("error:").red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Command::Version) {
        println!("sync_cli {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut client = PipeClient::connect(cli.coordinator_addr.clone()).await?;

    match cli.command {
        Command::Sync { src_uri, dest_uri } => {
            let src: AccountUri = src_uri.parse()?;
            let dest: AccountUri = dest_uri.parse()?;
            let reply = client
                .sync(SyncRequest {
                    src: Some(src.into()),
                    dest: Some(dest.into()),
                })
                .await?
                .into_inner();
            print_pairing_table(&reply.buckets);
        }
        Command::Start => {
            let mut stream = client.start(Empty {}).await?.into_inner();
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            while let Some(update) = stream.message().await? {
                if let Some(totals) = update.value {
                    bar.set_message(format!(
                        "scanned={} copied={} failed={} skipped={} bytes={}",
                        totals.scanned, totals.copied, totals.failed, totals.skipped, totals.size_bytes
                    ));
                    bar.tick();
                }
            }
            bar.finish_with_message("sync complete");
        }
        Command::Stat => {
            let mut stream = client.stat(Empty {}).await?.into_inner();
            if let Some(update) = stream.message().await? {
                print_stat_table(&update);
            }
        }
        Command::Stop => {
            match client.stop(Empty {}).await {
                Ok(_) => println!("stop acknowledged"),
                Err(status) if status.code() == tonic::Code::Unimplemented => {
                    println!("{}", "stop is reserved; no-op".yellow());
                }
                Err(status) => return Err(status.into()),
            }
        }
        Command::Version => unreachable!("handled above"),
    }

    Ok(())
}

fn print_pairing_table(buckets: &[protocol::BucketPairRow]) {
    let mut table = Table::new();
    table.set_header(vec!["Name", "Source", "Destination", "Orientation"]);
    for row in buckets {
        let orientation_cell = match row.orientation.as_str() {
            "To" => Cell::new(&row.orientation).fg(Color::Green),
            "From" => Cell::new(&row.orientation).fg(Color::Cyan),
            _ => Cell::new(&row.orientation).fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(&row.name),
            Cell::new(&row.src_bucket_domain),
            Cell::new(&row.dest_bucket_domain),
            orientation_cell,
        ]);
    }
    println!("{table}");
}

fn print_stat_table(update: &protocol::StatUpdate) {
    let mut table = Table::new();
    table.set_header(vec!["Bucket", "Scanned", "Copied", "Failed", "Finished"]);
    for summary in &update.bucket_summary {
        table.add_row(vec![
            Cell::new(&summary.name),
            Cell::new(summary.scan),
            Cell::new(summary.success),
            Cell::new(summary.fail),
            Cell::new(summary.finish),
        ]);
    }
    println!("{table}");
    if let Some(totals) = &update.value {
        println!(
            "total: scanned={} copied={} failed={} skipped={} bytes={}",
            totals.scanned, totals.copied, totals.failed, totals.skipped, totals.size_bytes
        );
    }
}
