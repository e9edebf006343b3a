//! cross-send - Background daemon for scheduled publishing
//!
//! Monitors the scheduled post queue and publishes due posts to their
//! platforms at the scheduled time.

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use libcrosscast::credentials::CredentialStore;
use libcrosscast::platforms::PublisherRegistry;
use libcrosscast::runner::ScheduledJobRunner;
use libcrosscast::{Config, CrosscastError, Database, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
cross-send - Background daemon for scheduled publishing

DESCRIPTION:
    cross-send is a long-running daemon that monitors the Crosscast
    schedule and publishes due posts to LinkedIn, Facebook, and
    Instagram at the right time.

    It polls the database at regular intervals, refreshes expiring OAuth
    tokens before publishing, and records the outcome on each scheduled
    post. Failed posts stay visible in the schedule list with their
    error; they are never retried automatically.

USAGE:
    # Run in foreground (logs to stderr)
    cross-send

    # Run with custom poll interval
    cross-send --poll-interval 30

    # Process due posts once and exit
    cross-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current post)

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml
    Override with CROSSCAST_CONFIG.

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
")]
struct Cli {
    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    poll_interval: u64,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    libcrosscast::logging::LoggingConfig::new(
        libcrosscast::logging::LogFormat::Text,
        level.to_string(),
        cli.verbose,
    )
    .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    let credentials = CredentialStore::new(
        db.clone(),
        config.linkedin.clone(),
        config.facebook.clone(),
    );
    let registry = PublisherRegistry::with_defaults(
        config
            .linkedin
            .as_ref()
            .map(|l| l.api_base.as_str())
            .unwrap_or("https://api.linkedin.com"),
        config
            .facebook
            .as_ref()
            .map(|f| f.graph_base.as_str())
            .unwrap_or("https://graph.facebook.com/v21.0"),
    );
    let runner = ScheduledJobRunner::new(db, credentials, registry);

    info!("cross-send daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    if cli.once {
        process_due_posts(&runner).await?;
        info!("cross-send: processed due posts once, exiting");
    } else {
        info!("Poll interval: {}s", cli.poll_interval);
        run_daemon_loop(&runner, cli.poll_interval, shutdown).await?;
    }

    info!("cross-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| CrosscastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(
    runner: &ScheduledJobRunner,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if let Err(e) = process_due_posts(runner).await {
            error!("Error processing due posts: {}", e);
        }

        // Sleep until the next poll, checking for shutdown every second
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(())
}

/// Publish every scheduled post whose time has come.
async fn process_due_posts(runner: &ScheduledJobRunner) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let outcomes = runner.run_due(now).await?;

    if outcomes.is_empty() {
        return Ok(());
    }

    let published = outcomes.iter().filter(|o| o.success).count();
    info!(
        "Processed {} due post(s): {} published, {} failed",
        outcomes.len(),
        published,
        outcomes.len() - published
    );

    Ok(())
}
