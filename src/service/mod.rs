//! Dashboard Data Service
//!
//! Owns the response cache and the upstream clients, and assembles
//! everything the dashboard renders. Every read goes through
//! fetch-with-cache: key lookup, then a live fetch on miss, then a
//! write-back. A failed live fetch degrades that slice to "no data";
//! an expired cache entry is never served in its place, so staleness is
//! never presented as freshness.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::broker::{AccountSummary, BrokerApi, OpenPosition};
use crate::cache::{
    account_key, bars_key, orders_key, portfolio_history_key, positions_key, CacheKeyInfo, Clock,
    ResponseCache, SystemClock,
};
use crate::error::FetchError;
use crate::history::{
    dedupe_checkpoints, generate_synthetic_series, reconstruct, PositionSnapshot,
};
use crate::marketdata::BarsProvider;
use crate::persistence::CsvPersistence;
use crate::types::{Fill, FillSide, PricePoint, ValuationCheckpoint};

/// Everything the portfolio history chart needs for one render
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioChartData {
    /// Hour-deduplicated equity curve
    pub checkpoints: Vec<ValuationCheckpoint>,
    /// Net open positions per checkpoint
    pub snapshots: Vec<PositionSnapshot>,
    /// Hourly price series per traded symbol; points carry a synthetic flag
    pub series: BTreeMap<String, Vec<PricePoint>>,
}

/// Result of an order-history CSV export
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub path: String,
    pub rows: usize,
}

/// Assembles dashboard data from the brokerage and market-data APIs
/// through the response cache
pub struct DashboardService {
    cache: Arc<ResponseCache>,
    broker: Arc<dyn BrokerApi>,
    bars: Arc<dyn BarsProvider>,
    persistence: Option<CsvPersistence>,
    clock: Arc<dyn Clock>,
    history_days: u32,
    order_limit: usize,
}

impl DashboardService {
    pub fn new(
        cache: Arc<ResponseCache>,
        broker: Arc<dyn BrokerApi>,
        bars: Arc<dyn BarsProvider>,
        persistence: Option<CsvPersistence>,
        history_days: u32,
        order_limit: usize,
    ) -> Self {
        Self::with_clock(
            cache,
            broker,
            bars,
            persistence,
            history_days,
            order_limit,
            Arc::new(SystemClock),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_clock(
        cache: Arc<ResponseCache>,
        broker: Arc<dyn BrokerApi>,
        bars: Arc<dyn BarsProvider>,
        persistence: Option<CsvPersistence>,
        history_days: u32,
        order_limit: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            broker,
            bars,
            persistence,
            clock,
            history_days,
            order_limit,
        }
    }

    /// Cache-through fetch. `None` means the slice has no data right now:
    /// cache miss plus failed live fetch.
    async fn cached<T, F, Fut>(&self, key: &str, fetch: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if let Some(payload) = self.cache.get(key) {
            match serde_json::from_value(payload) {
                Ok(value) => return Some(value),
                Err(err) => {
                    warn!(key = %key, error = %err, "discarding undecodable cache payload");
                }
            }
        }

        match fetch().await {
            Ok(value) => {
                match serde_json::to_value(&value) {
                    Ok(payload) => self.cache.put(key, payload),
                    Err(err) => warn!(key = %key, error = %err, "payload not cacheable"),
                }
                Some(value)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "live fetch failed, slice degrades to no data");
                None
            }
        }
    }

    /// Account balances, or `None` when the upstream is unavailable
    pub async fn account(&self) -> Option<AccountSummary> {
        self.cached(&account_key(), || self.broker.account()).await
    }

    /// Open positions, or `None` when the upstream is unavailable
    pub async fn positions(&self) -> Option<Vec<OpenPosition>> {
        self.cached(&positions_key(), || self.broker.open_positions())
            .await
    }

    /// Normalized order fills, newest first as served upstream
    pub async fn fills(&self) -> Option<Vec<Fill>> {
        self.cached(&orders_key("closed"), || {
            self.broker.order_fills(self.order_limit)
        })
        .await
    }

    /// Hour-deduplicated portfolio valuation checkpoints
    pub async fn checkpoints(&self) -> Option<Vec<ValuationCheckpoint>> {
        let raw = self
            .cached(&portfolio_history_key(self.history_days), || {
                self.broker.portfolio_history(self.history_days)
            })
            .await?;
        Some(dedupe_checkpoints(&raw))
    }

    /// Assemble the full chart payload: equity curve, per-checkpoint
    /// position snapshots, and an hourly price series per traded symbol
    /// (real bars when the provider has them, tagged synthetic otherwise).
    pub async fn portfolio_chart(&self) -> Option<PortfolioChartData> {
        let fills = self.fills().await?;
        let checkpoints = self.checkpoints().await?;
        let snapshots = reconstruct(&fills, &checkpoints);

        let mut symbols: Vec<String> = fills.iter().map(|f| f.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();

        let mut series = BTreeMap::new();
        for symbol in symbols {
            if let Some(points) = self.symbol_series(&symbol, &fills).await {
                series.insert(symbol, points);
            }
        }

        Some(PortfolioChartData {
            checkpoints,
            snapshots,
            series,
        })
    }

    /// Price series for one symbol: real hourly bars over the symbol's
    /// trading window, falling back to the synthetic generator when the
    /// provider has nothing for the range.
    async fn symbol_series(&self, symbol: &str, fills: &[Fill]) -> Option<Vec<PricePoint>> {
        let buy = first_buy(symbol, fills)?;
        let now = self.clock.now_millis();
        let end = last_sell(symbol, fills, buy.timestamp)
            .map(|sell| sell.timestamp)
            .unwrap_or(now);

        // A failed bars fetch means no series for the symbol; only a valid
        // empty result (provider doesn't cover the symbol/range) falls
        // through to the synthetic generator.
        let key = bars_key(symbol, buy.timestamp, end);
        let real = self
            .cached(&key, || self.bars.hourly_closes(symbol, buy.timestamp, end))
            .await?;

        if !real.is_empty() {
            return Some(real);
        }

        let buy_price = buy.price?;
        let sell = last_sell(symbol, fills, buy.timestamp)
            .and_then(|fill| fill.price.map(|price| (fill.timestamp, price)));
        Some(generate_synthetic_series(
            symbol, buy.timestamp, buy_price, sell, now,
        ))
    }

    /// Operator-facing cache listing
    pub fn cache_entries(&self) -> Vec<CacheKeyInfo> {
        self.cache.entries()
    }

    /// Export the current order history to CSV
    pub async fn export_order_history(&self) -> Result<ExportSummary> {
        let Some(persistence) = &self.persistence else {
            bail!("CSV export is disabled");
        };
        let Some(fills) = self.fills().await else {
            bail!("no order data available to export");
        };
        let path = persistence
            .write_order_history(&fills)
            .context("Failed to export order history")?;
        Ok(ExportSummary {
            path: path.display().to_string(),
            rows: fills.len(),
        })
    }
}

fn first_buy<'a>(symbol: &str, fills: &'a [Fill]) -> Option<&'a Fill> {
    fills
        .iter()
        .filter(|f| f.symbol == symbol && f.side == FillSide::Buy)
        .min_by_key(|f| f.timestamp)
}

fn last_sell<'a>(symbol: &str, fills: &'a [Fill], after: i64) -> Option<&'a Fill> {
    fills
        .iter()
        .filter(|f| f.symbol == symbol && f.side == FillSide::Sell && f.timestamp > after)
        .max_by_key(|f| f.timestamp)
}
