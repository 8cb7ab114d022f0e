//! Configuration management for PaperDash
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub cache: CacheConfig,
    pub history: HistoryConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the dashboard API
    pub host: String,
    /// Bind port
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Trading/account API endpoint
    pub base_url: String,
    /// Market-data API endpoint
    pub data_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum order-history records per fetch
    pub order_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL for account/position/order data in seconds
    pub short_ttl_secs: u64,
    /// TTL for historical price bars in seconds
    pub long_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Trailing window of portfolio history to chart, in days
    pub period_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory for CSV exports
    pub data_dir: String,
    /// Enable the order-history CSV export endpoint
    pub csv_enabled: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Broker defaults
            .set_default("broker.base_url", "https://paper-api.alpaca.markets")?
            .set_default("broker.data_url", "https://data.alpaca.markets")?
            .set_default("broker.timeout_secs", 10)?
            .set_default("broker.order_limit", 500)?
            // Cache defaults
            .set_default("cache.short_ttl_secs", 30)?
            .set_default("cache.long_ttl_secs", 3600)?
            // History defaults
            .set_default("history.period_days", 30)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (PAPERDASH_*)
            .add_source(Environment::with_prefix("PAPERDASH").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "server={}:{} broker={} history={}d ttl={}s/{}s",
            self.server.host,
            self.server.port,
            self.broker.base_url,
            self.history.period_days,
            self.cache.short_ttl_secs,
            self.cache.long_ttl_secs
        )
    }

    /// Validate required environment variables
    pub fn validate_env(&self) -> Result<()> {
        let required = vec!["APCA_API_KEY_ID", "APCA_API_SECRET_KEY"];

        for var in required {
            if std::env::var(var).is_err() {
                bail!("Required environment variable {} is not set", var);
            }
        }

        Ok(())
    }

    /// Brokerage credentials from the environment
    pub fn credentials(&self) -> Result<(String, String)> {
        let key_id =
            std::env::var("APCA_API_KEY_ID").context("APCA_API_KEY_ID is not set")?;
        let secret_key =
            std::env::var("APCA_API_SECRET_KEY").context("APCA_API_SECRET_KEY is not set")?;
        Ok((key_id, secret_key))
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
