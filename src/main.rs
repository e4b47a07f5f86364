use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forum_feed_cache::autoload::ScrollMetrics;
use forum_feed_cache::channel::ChannelKind;
use forum_feed_cache::clock::SystemClock;
use forum_feed_cache::config::Config;
use forum_feed_cache::display::TextDisplay;
use forum_feed_cache::engine::FeedEngine;
use forum_feed_cache::scheduler::Scheduler;
use forum_feed_cache::source::HttpSource;
use forum_feed_cache::store::SqliteStore;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Forum,
    Feed,
}

impl From<Kind> for ChannelKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Forum => Self::RangeScan,
            Kind::Feed => Self::TokenScan,
        }
    }
}

/// Show a forum or feed, refreshing the local cache as needed.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Whether CHANNEL names a forum or a feed.
    #[arg(value_enum)]
    kind: Kind,

    /// Channel name, e.g. "World News" or "Home".
    channel: String,

    /// Load this many further increments after activation.
    #[arg(long, default_value_t = 0)]
    more: u32,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(api_url = %config.api_url, "Configuration loaded");

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let store = SqliteStore::open(&config.database_path)
        .await
        .context("Failed to open cache store")?;
    let source = HttpSource::new(&config).context("Failed to build HTTP client")?;

    let scheduler = Scheduler::new(
        Arc::new(store),
        Arc::new(source),
        Arc::new(SystemClock),
        config.staleness,
    );
    let display = Arc::new(TextDisplay::new(
        std::io::stdout(),
        config.image_cdn_url.clone(),
    ));
    let engine = FeedEngine::new(scheduler, display, &config);

    let Some(report) = engine.activate(args.kind.into(), &args.channel).await? else {
        anyhow::bail!("Unknown {:?} channel: {}", args.kind, args.channel);
    };
    info!(
        mode = report.mode.map(|m| m.as_str()),
        outcome = ?report.outcome,
        cached = report.posts.len(),
        "Channel loaded"
    );

    // A terminal has no scroll position; every step is treated as reaching
    // the bottom of a long page, paced by the autoload cooldown.
    let bottom = ScrollMetrics {
        content_height: u32::MAX,
        distance_to_bottom: 0,
    };
    for _ in 0..args.more {
        tokio::time::sleep(config.autoload.cooldown).await;
        if let Some(report) = engine.on_scroll(bottom).await? {
            info!(admitted = report.admitted.len(), outcome = ?report.outcome, "Loaded more");
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,forum_feed_cache=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Posts go to stdout, so logs go to stderr.
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
