//! PaperDash entrypoint
//!
//! Wires config, logging, clients, cache and the HTTP server together.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use paperdash::broker::BrokerClient;
use paperdash::cache::ResponseCache;
use paperdash::config::AppConfig;
use paperdash::dashboard;
use paperdash::marketdata::MarketDataClient;
use paperdash::persistence::CsvPersistence;
use paperdash::service::DashboardService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate_env()?;
    info!("starting paperdash: {}", config.digest());

    let (key_id, secret_key) = config.credentials()?;
    let timeout = Duration::from_secs(config.broker.timeout_secs);

    let broker = BrokerClient::new(&config.broker.base_url, &key_id, &secret_key, timeout)?;
    let bars = MarketDataClient::new(&config.broker.data_url, &key_id, &secret_key, timeout)?;

    let cache = Arc::new(ResponseCache::new(
        Duration::from_secs(config.cache.short_ttl_secs),
        Duration::from_secs(config.cache.long_ttl_secs),
    ));

    let persistence = if config.persistence.csv_enabled {
        Some(CsvPersistence::new(&config.persistence.data_dir)?)
    } else {
        None
    };

    let service = Arc::new(DashboardService::new(
        cache,
        Arc::new(broker),
        Arc::new(bars),
        persistence,
        config.history.period_days,
        config.broker.order_limit,
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    dashboard::serve(addr, service).await
}
