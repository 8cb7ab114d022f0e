//! Historical price-bar API
//!
//! Hourly closing prices for a symbol over a date range. A range or
//! symbol the provider has no data for is a valid, empty result that
//! sends the caller to the synthetic fallback series, never an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::error::FetchError;
use crate::types::{parse_rfc3339_millis, PricePoint};

/// Source of hourly closing prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BarsProvider: Send + Sync {
    /// Hourly closes for `symbol` in `[start_ms, end_ms]`.
    ///
    /// An empty vec means the provider has no data for the range, which
    /// is not a failure.
    async fn hourly_closes(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PricePoint>, FetchError>;
}

#[derive(Debug, Clone, Deserialize)]
struct BarResponse {
    /// Bar timestamp, ISO-8601
    t: String,
    /// Closing price
    c: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<Vec<BarResponse>>,
}

/// REST client for the market-data API
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(
        base_url: &str,
        key_id: &str,
        secret_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "APCA-API-KEY-ID",
            HeaderValue::from_str(key_id).context("Invalid API key id header value")?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            HeaderValue::from_str(secret_key).context("Invalid API secret header value")?,
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn rfc3339(ts_millis: i64) -> String {
    match Utc.timestamp_millis_opt(ts_millis).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => String::new(),
    }
}

#[async_trait]
impl BarsProvider for MarketDataClient {
    async fn hourly_closes(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let url = format!(
            "{}/v2/stocks/{}/bars?timeframe=1Hour&start={}&end={}&limit=10000",
            self.base_url,
            symbol.to_uppercase(),
            rfc3339(start_ms),
            rfc3339(end_ms)
        );

        let response = self.client.get(&url).send().await?;

        // Unknown symbols come back as 404; that is "no data", not failure
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(FetchError::Upstream {
                status: response.status().as_u16(),
            });
        }

        let payload: BarsResponse = response.json().await?;

        let mut points: Vec<PricePoint> = payload
            .bars
            .unwrap_or_default()
            .into_iter()
            .filter_map(|bar| {
                let Some(timestamp) = parse_rfc3339_millis(&bar.t) else {
                    warn!(symbol = %symbol, raw = %bar.t, "skipping bar with unparseable timestamp");
                    return None;
                };
                if !bar.c.is_finite() {
                    warn!(symbol = %symbol, ts = timestamp, "skipping bar with non-finite close");
                    return None;
                }
                Some(PricePoint {
                    timestamp,
                    price: bar.c,
                    synthetic: false,
                })
            })
            .collect();
        points.sort_by_key(|point| point.timestamp);

        Ok(points)
    }
}
