use std::sync::Arc;

use tracing::{error, info, warn};

use feedrelay::config::Config;
use feedrelay::feed::{FeedRepository, NewFeedSource};
use feedrelay::fetcher::Fetcher;
use feedrelay::pipeline::{cancel_pair, start_scheduler, Orchestrator};
use feedrelay::publish::CmsPublisher;
use feedrelay::transform::Transformer;
use feedrelay::web::{AppState, WebServer};
use feedrelay::Database;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = feedrelay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        feedrelay::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> feedrelay::Result<()> {
    info!("feedrelay starting");

    let db = Database::open(&config.database.path).await?;
    sync_feeds(&db, &config).await?;

    let fetcher = Arc::new(Fetcher::from_config(&config.fetcher)?);
    let transformer = Transformer::from_config(&config.providers)?;
    info!("AI providers: {}", transformer.provider_keys().join(", "));
    let publisher = Arc::new(CmsPublisher::new(&config.cms)?);
    let orchestrator = Arc::new(Orchestrator::new(
        db.clone(),
        fetcher,
        transformer,
        publisher,
        config.pipeline.clone(),
    ));

    let (shutdown, shutdown_token) = cancel_pair();

    let scheduler = if config.scheduler.enabled {
        Some(start_scheduler(
            db.clone(),
            orchestrator.clone(),
            &config.scheduler,
            shutdown_token.clone(),
        ))
    } else {
        info!("Scheduler disabled");
        None
    };

    let server = if config.server.enabled {
        let state = AppState::new(db.clone(), orchestrator.clone(), &config.legacy)?;
        let server = WebServer::new(&config.server, state, config.legacy.enabled)?;
        let token = shutdown_token.clone();
        Some(tokio::spawn(async move { server.run(token).await }))
    } else {
        info!("Web API disabled");
        None
    };

    if scheduler.is_none() && server.is_none() {
        warn!("Neither the scheduler nor the web API is enabled; exiting");
        return Ok(());
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    shutdown.cancel();

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }
    if let Some(handle) = server {
        match handle.await {
            Ok(result) => result?,
            Err(e) => error!("Web server task failed: {}", e),
        }
    }

    info!("feedrelay stopped");
    Ok(())
}

/// Upsert the `[[feeds]]` entries of the configuration file.
async fn sync_feeds(db: &Database, config: &Config) -> feedrelay::Result<()> {
    let repo = FeedRepository::new(db.pool());
    for definition in &config.feeds {
        let feed = repo.upsert(&NewFeedSource::from(definition)).await?;
        info!(
            "Feed {} (id {}) synced: {} via {}/{}",
            feed.name, feed.id, feed.url, feed.provider, feed.template
        );
    }
    Ok(())
}
