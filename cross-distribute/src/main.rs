//! cross-distribute - Generate and schedule social posts for an article

use clap::Parser;
use std::sync::Arc;

use libcrosscast::distribution::{DistributionOrchestrator, DistributionRequest};
use libcrosscast::generation::{ContentGenerator, OpenAiCompatibleModel};
use libcrosscast::rate_limiter::{InMemoryRateLimitStore, RateLimiter};
use libcrosscast::{Config, ContentTarget, CrosscastError, Database, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-distribute")]
#[command(version)]
#[command(about = "Generate and schedule social posts for an article")]
#[command(long_about = "\
cross-distribute - Generate and schedule social posts for an article

DESCRIPTION:
    cross-distribute generates AI-assisted marketing copy for an article
    and optionally schedules it for publication to LinkedIn, Facebook,
    and Instagram. Newsletter and medium are long-form targets: they are
    generated and persisted as previews but never scheduled.

    Without --publish-at, generated content is persisted as previews
    only. With --publish-at, a scheduled post is created per channel
    target; cross-send publishes them when they come due.

USAGE:
    # Preview content for two channels
    cross-distribute my-article --targets linkedin,facebook

    # Draft the newsletter issue alongside the social posts
    cross-distribute my-article --targets newsletter,linkedin,medium

    # Schedule all channels for tomorrow morning
    cross-distribute my-article --targets linkedin,facebook,instagram \\
        --publish-at \"tomorrow 9am\"

    # Regenerate even though a channel is already scheduled
    cross-distribute my-article --targets linkedin --publish-at 2h --force

    # Show the article's schedule list
    cross-distribute my-article --list

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml
    Override with CROSSCAST_CONFIG.

EXIT CODES:
    0 - Success
    1 - Runtime error
    2 - Credential error (reconnect the account)
    3 - Invalid input
    4 - Generation rate-limited
")]
struct Cli {
    /// Article id to distribute
    article_id: String,

    /// Content targets, comma-separated (newsletter, linkedin, facebook,
    /// instagram, medium)
    #[arg(short, long, value_delimiter = ',')]
    targets: Vec<ContentTarget>,

    /// When to publish ("now", "2h", "tomorrow 9am", "2026-09-01 15:00").
    /// Omit to generate previews only.
    #[arg(long, value_name = "WHEN")]
    publish_at: Option<String>,

    /// Bypass the already-scheduled check
    #[arg(long)]
    force: bool,

    /// List the article's scheduled posts instead of distributing
    #[arg(long, conflicts_with_all = ["targets", "publish_at", "force"])]
    list: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
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

    if cli.list {
        return list_schedule(&db, &cli).await;
    }

    if cli.targets.is_empty() {
        return Err(CrosscastError::InvalidInput(
            "At least one target is required (--targets newsletter,linkedin,facebook,instagram,medium)"
                .to_string(),
        ));
    }

    let publish_at = match &cli.publish_at {
        Some(input) => Some(libcrosscast::scheduling::parse_schedule(input)?.timestamp()),
        None => None,
    };

    let model = OpenAiCompatibleModel::new(
        &config.model.endpoint,
        &config.model.model,
        config.model_api_key()?,
    );
    let limiter = RateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        config.generation.window_ms,
    );
    let generator = ContentGenerator::new(Arc::new(model), limiter);
    let orchestrator = DistributionOrchestrator::new(db, generator, config.site.clone());

    let outcome = orchestrator
        .run_distribution(&DistributionRequest {
            article_id: cli.article_id.clone(),
            targets: cli.targets.clone(),
            publish_at,
            force: cli.force,
        })
        .await;

    match cli.format.as_str() {
        "json" => {
            let report = serde_json::json!({
                "success": outcome.success,
                "scheduled_post_ids": outcome.scheduled_post_ids,
                "previews": outcome.previews,
                "error": outcome.error.as_ref().map(|e| e.to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
        _ => {
            for preview in &outcome.previews {
                println!("--- {} ---", preview.target);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&preview.content).unwrap_or_default()
                );
            }
            for id in &outcome.scheduled_post_ids {
                println!("scheduled: {}", id);
            }
            if let Some(error) = &outcome.error {
                eprintln!("Error: {}", error);
            }
        }
    }

    if outcome.success {
        Ok(())
    } else {
        // The orchestrator flattened the error into the outcome; its
        // category still decides the exit code
        std::process::exit(outcome.exit_code());
    }
}

async fn list_schedule(db: &Database, cli: &Cli) -> Result<()> {
    let posts = db.list_scheduled_posts(&cli.article_id).await?;

    if cli.format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&posts).unwrap_or_default()
        );
        return Ok(());
    }

    if posts.is_empty() {
        println!("No scheduled posts for {}", cli.article_id);
        return Ok(());
    }

    for post in posts {
        let when = chrono::DateTime::from_timestamp(post.scheduled_at, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| post.scheduled_at.to_string());
        let detail = match post.status {
            libcrosscast::ScheduleStatus::Published => {
                post.platform_post_id.unwrap_or_default()
            }
            libcrosscast::ScheduleStatus::Failed => post.error.unwrap_or_default(),
            libcrosscast::ScheduleStatus::Scheduled => String::new(),
        };
        println!(
            "{}  {:9}  {:9}  {}  {}",
            post.id, post.channel, post.status, when, detail
        );
    }

    Ok(())
}
