use anyhow::{Context, Result};
use std::sync::Arc;

use upbit_listing_watcher::api::{HttpClient, NoticeParser, UpbitClient};
use upbit_listing_watcher::core::{self, server, Config, HealthChecker};
use upbit_listing_watcher::monitoring::{
    BaselineStore, ListingNotifier, ListingWatcher, TelegramSink,
};
use upbit_listing_watcher::scanner::MarketFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Credential problems abort before anything starts
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    core::logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 Upbit listing watcher starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match &config.env_file {
        Some(path) => tracing::info!("Loaded environment file: {}", path.display()),
        None => tracing::warn!("Environment file not found, using process environment"),
    }
    if config.telegram.chat_id.is_none() {
        tracing::warn!("TG_CHAT_ID is empty: the watcher runs but cannot deliver notifications");
    }

    let filter = MarketFilter::new(&config.watcher.filter_markets);
    let health_checker = HealthChecker::new(filter.prefixes().to_vec());

    let health_clone = health_checker.clone();
    let health_port = config.monitoring.health_port;
    tokio::spawn(async move { server::start_health_server(health_clone, health_port).await });

    let http = HttpClient::new(config.upbit.request_timeout).context("Failed to build HTTP client")?;
    let parser = NoticeParser::new(&config.upbit.notices_url, &config.watcher.filter_markets)
        .context("Invalid UPBIT_NOTICES_URL")?;
    let upbit = Arc::new(UpbitClient::new(http, &config.upbit, parser));

    let sink = Arc::new(
        TelegramSink::new(&config.telegram).context("Failed to build Telegram client")?,
    );
    let notifier = ListingNotifier::new(sink, filter, config.upbit.markets_url.clone());

    let watcher = ListingWatcher::new(
        upbit.clone(),
        upbit,
        BaselineStore::new(&config.watcher.cache_dir),
        notifier,
        health_checker,
        config.watcher.poll_interval,
    );

    tokio::select! {
        _ = watcher.start() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}
