//! fanout-send - Background daemon for scheduled publishing
//!
//! Polls for scheduled posts whose time has come and runs the publish
//! orchestrator for each of them.

use anyhow::{Context, Result};
use clap::Parser;
use libfanout::service::FanoutService;
use libfanout::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "fanout-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
fanout-send - Background daemon for scheduled publishing

DESCRIPTION:
    fanout-send is a long-running daemon that publishes scheduled posts.
    It polls the database at regular intervals and runs every post whose
    scheduled time has passed. A post that fails on some platform is left
    in the failed state with per-platform reasons; re-publishing it with
    `fanout-post post publish` retries only the failed platforms.

USAGE:
    # Run in foreground (logs to stderr)
    fanout-send

    # Run with custom poll interval
    fanout-send --poll-interval 30

    # Process due posts once and exit
    fanout-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current pass)

CONFIGURATION:
    Configuration file: ~/.config/fanout/config.toml
    Database location: ~/.local/share/fanout/fanout.db

    [scheduling]
    poll_interval = 60  # seconds between polls

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    libfanout::logging::init_default(cli.verbose);

    let config = Config::load().context("Failed to load configuration")?;
    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.scheduling.poll_interval)
        .max(1);

    let service = FanoutService::from_config(config)
        .await
        .context("Failed to open the post database")?;

    info!("fanout-send daemon starting");

    if cli.once {
        process_due_posts(&service).await?;
        info!("fanout-send: processed due posts once, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("Poll interval: {}s", poll_interval);
    run_daemon_loop(&service, poll_interval, shutdown).await;

    info!("fanout-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, stopping gracefully...", sig);
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}

async fn run_daemon_loop(service: &FanoutService, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if let Err(e) = process_due_posts(service).await {
            error!("Error processing scheduled posts: {:#}", e);
        }

        // Sleep until next poll, checking for shutdown every second
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

async fn process_due_posts(service: &FanoutService) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let reports = service
        .process_due(now)
        .await
        .context("Failed to read scheduled posts")?;

    for report in &reports {
        info!(
            "Post {} is {} ({} published, {} failed)",
            report.post_id,
            report.status,
            report.published(),
            report.failed()
        );
    }

    Ok(())
}
