//! End-to-end tests for the cache, reconstruction and dashboard service

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use paperdash::broker::{AccountSummary, BrokerApi, OpenPosition};
use paperdash::cache::{bars_key, Clock, ResponseCache};
use paperdash::error::FetchError;
use paperdash::history::{generate_synthetic_series, reconstruct};
use paperdash::marketdata::BarsProvider;
use paperdash::service::DashboardService;
use paperdash::types::{Fill, FillSide, PricePoint, ValuationCheckpoint};

const HOUR_MS: i64 = 3_600_000;

// ============================================================================
// Test doubles
// ============================================================================

struct StepClock {
    now: AtomicI64,
}

impl StepClock {
    fn new(start: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(start),
        })
    }

    fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for StepClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Canned brokerage serving a fixed fill list and equity curve
struct CannedBroker {
    fills: Vec<Fill>,
    checkpoints: Vec<ValuationCheckpoint>,
}

#[async_trait]
impl BrokerApi for CannedBroker {
    async fn account(&self) -> Result<AccountSummary, FetchError> {
        Ok(AccountSummary {
            status: "ACTIVE".to_string(),
            currency: "USD".to_string(),
            cash: 1000.0,
            equity: 2000.0,
            buying_power: 2000.0,
            portfolio_value: 2000.0,
        })
    }

    async fn open_positions(&self) -> Result<Vec<OpenPosition>, FetchError> {
        Ok(Vec::new())
    }

    async fn order_fills(&self, _limit: usize) -> Result<Vec<Fill>, FetchError> {
        Ok(self.fills.clone())
    }

    async fn portfolio_history(
        &self,
        _period_days: u32,
    ) -> Result<Vec<ValuationCheckpoint>, FetchError> {
        Ok(self.checkpoints.clone())
    }
}

/// Market-data provider with no coverage for any symbol
struct EmptyBars;

#[async_trait]
impl BarsProvider for EmptyBars {
    async fn hourly_closes(
        &self,
        _symbol: &str,
        _start_ms: i64,
        _end_ms: i64,
    ) -> Result<Vec<PricePoint>, FetchError> {
        Ok(Vec::new())
    }
}

fn fill(symbol: &str, side: FillSide, quantity: f64, price: f64, ts: i64) -> Fill {
    Fill {
        symbol: symbol.to_string(),
        side,
        quantity,
        price: Some(price),
        timestamp: ts,
    }
}

fn checkpoint(ts: i64, value: f64) -> ValuationCheckpoint {
    ValuationCheckpoint {
        timestamp: ts,
        value,
    }
}

// ============================================================================
// Cache properties
// ============================================================================

#[test]
fn test_cache_ttl_boundaries() {
    let clock = StepClock::new(0);
    let cache = ResponseCache::with_clock(
        Duration::from_secs(30),
        Duration::from_secs(3600),
        clock.clone(),
    );

    cache.put("account", serde_json::json!({"equity": "1"}));
    let bars = bars_key("AAPL", 0, 24 * HOUR_MS);
    cache.put(&bars, serde_json::json!([]));

    assert!(cache.get("account").is_some());
    assert!(cache.get(&bars).is_some());

    // Past the short TTL: account expires, bars survive
    clock.advance(30_000);
    assert!(cache.get("account").is_none());
    assert!(cache.get(&bars).is_some());

    // Past the long TTL: bars expire too
    clock.advance(3600_000);
    assert!(cache.get(&bars).is_none());
}

#[test]
fn test_cache_key_determinism() {
    let a = bars_key("aapl", 1_709_251_200_000, 1_711_929_600_000);
    let b = bars_key("AAPL", 1_709_251_200_000, 1_711_929_600_000);
    assert_eq!(a, b);

    let other_symbol = bars_key("TSLA", 1_709_251_200_000, 1_711_929_600_000);
    let other_range = bars_key("AAPL", 1_709_251_200_000, 1_712_016_000_000);
    assert_ne!(a, other_symbol);
    assert_ne!(a, other_range);
}

#[test]
fn test_cache_whole_value_replacement_interleaved() {
    let clock = StepClock::new(0);
    let cache = Arc::new(ResponseCache::with_clock(
        Duration::from_secs(30),
        Duration::from_secs(3600),
        clock,
    ));

    // Two racing writers simulate the double-miss-double-fetch case;
    // whichever finishes last must fully own the entry.
    cache.put("orders:closed", serde_json::json!({"gen": "A", "extra": true}));
    cache.put("orders:closed", serde_json::json!({"gen": "B"}));

    let value = cache.get("orders:closed").unwrap();
    assert_eq!(value, serde_json::json!({"gen": "B"}));
}

// ============================================================================
// Reconstruction properties
// ============================================================================

#[test]
fn test_reconstruction_is_deterministic() {
    let fills = vec![
        fill("AAPL", FillSide::Buy, 10.0, 100.0, 0),
        fill("TSLA", FillSide::Buy, 0.5, 200.0, HOUR_MS / 2),
        fill("AAPL", FillSide::Sell, 10.0, 110.0, 5 * HOUR_MS),
    ];
    let checkpoints: Vec<ValuationCheckpoint> =
        (0..8).map(|h| checkpoint(h * HOUR_MS, 1000.0)).collect();

    let first = serde_json::to_vec(&reconstruct(&fills, &checkpoints)).unwrap();
    let second = serde_json::to_vec(&reconstruct(&fills, &checkpoints)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_zero_crossing_and_pre_window_fills() {
    // Bought before the chart window opens
    let fills = vec![
        fill("MSFT", FillSide::Buy, 4.0, 300.0, -24 * HOUR_MS),
        fill("MSFT", FillSide::Sell, 4.0, 310.0, 2 * HOUR_MS),
    ];
    let checkpoints: Vec<ValuationCheckpoint> =
        (0..4).map(|h| checkpoint(h * HOUR_MS, 1200.0)).collect();

    let snapshots = reconstruct(&fills, &checkpoints);
    assert_eq!(snapshots[0].positions.get("MSFT"), Some(&4.0));
    assert_eq!(snapshots[1].positions.get("MSFT"), Some(&4.0));
    assert!(snapshots[2].positions.is_empty());
    assert!(snapshots[3].positions.is_empty());
}

#[test]
fn test_end_to_end_scenario_from_fills_to_snapshots() {
    // fills = [{AAPL, BUY, 10, $100, t=0h}, {AAPL, SELL, 10, $110, t=5h}]
    let fills = vec![
        fill("AAPL", FillSide::Buy, 10.0, 100.0, 0),
        fill("AAPL", FillSide::Sell, 10.0, 110.0, 5 * HOUR_MS),
    ];
    let checkpoints: Vec<ValuationCheckpoint> = [0, 1, 3, 5, 6]
        .iter()
        .map(|h| checkpoint(h * HOUR_MS, 1000.0))
        .collect();

    let snapshots = reconstruct(&fills, &checkpoints);

    let mut expected_open = BTreeMap::new();
    expected_open.insert("AAPL".to_string(), 10.0);

    assert_eq!(snapshots[0].positions, expected_open);
    assert_eq!(snapshots[1].positions, expected_open);
    assert_eq!(snapshots[2].positions, expected_open);
    assert!(snapshots[3].positions.is_empty());
    assert!(snapshots[4].positions.is_empty());
}

// ============================================================================
// Synthetic fallback properties
// ============================================================================

#[test]
fn test_synthetic_terminal_and_bounds() {
    let buy_price = 100.0;
    let now = 36 * HOUR_MS;
    let series = generate_synthetic_series("ZGEN", 0, buy_price, None, now);

    let last = series.last().unwrap();
    assert_eq!(last.price, 1.05 * buy_price);

    let bound = (0.03 + 0.01) * buy_price;
    for point in &series {
        let frac = point.timestamp as f64 / now as f64;
        let trend = buy_price + (1.05 * buy_price - buy_price) * frac;
        assert!((point.price - trend).abs() <= bound + 1e-9);
        assert!(point.synthetic);
    }
}

#[test]
fn test_synthetic_reproducibility() {
    let a = generate_synthetic_series("ZGEN", 7 * HOUR_MS, 42.0, None, 90 * HOUR_MS);
    let b = generate_synthetic_series("ZGEN", 7 * HOUR_MS, 42.0, None, 90 * HOUR_MS);
    assert_eq!(a, b);
}

// ============================================================================
// Service assembly
// ============================================================================

#[tokio::test]
async fn test_service_builds_chart_with_synthetic_fallback() {
    let clock = StepClock::new(48 * HOUR_MS);
    let cache = Arc::new(ResponseCache::with_clock(
        Duration::from_secs(30),
        Duration::from_secs(3600),
        clock.clone(),
    ));
    let broker = CannedBroker {
        fills: vec![
            fill("AAPL", FillSide::Buy, 10.0, 100.0, 0),
            fill("AAPL", FillSide::Sell, 10.0, 110.0, 5 * HOUR_MS),
        ],
        checkpoints: vec![
            // Raw samples include two in the same hour; the top-of-hour
            // sample must win the bucket
            checkpoint(HOUR_MS + 600_000, 1000.0),
            checkpoint(HOUR_MS, 1001.0),
            checkpoint(6 * HOUR_MS, 1100.0),
        ],
    };
    let service = DashboardService::with_clock(
        cache,
        Arc::new(broker),
        Arc::new(EmptyBars),
        None,
        30,
        500,
        clock,
    );

    let chart = service.portfolio_chart().await.expect("chart data");

    // Hour dedup kept the top-of-hour sample
    assert_eq!(chart.checkpoints.len(), 2);
    assert_eq!(chart.checkpoints[0].timestamp, HOUR_MS);
    assert_eq!(chart.checkpoints[0].value, 1001.0);

    // Position open at 1h, closed by 6h
    assert_eq!(chart.snapshots[0].positions.get("AAPL"), Some(&10.0));
    assert!(chart.snapshots[1].positions.is_empty());

    // No bars coverage: the series is synthetic, ends at the sell price
    let series = chart.series.get("AAPL").expect("AAPL series");
    assert!(series.iter().all(|p| p.synthetic));
    assert_eq!(series.last().unwrap().price, 110.0);
    assert_eq!(series.last().unwrap().timestamp, 5 * HOUR_MS);
}

#[tokio::test]
async fn test_service_account_roundtrip() {
    let clock = StepClock::new(0);
    let cache = Arc::new(ResponseCache::with_clock(
        Duration::from_secs(30),
        Duration::from_secs(3600),
        clock.clone(),
    ));
    let broker = CannedBroker {
        fills: Vec::new(),
        checkpoints: Vec::new(),
    };
    let service = DashboardService::with_clock(
        cache,
        Arc::new(broker),
        Arc::new(EmptyBars),
        None,
        30,
        500,
        clock,
    );

    let account = service.account().await.expect("account data");
    assert_eq!(account.equity, 2000.0);

    // Cache introspection shows a valid short-TTL entry
    let entries = service.cache_entries();
    let account_entry = entries.iter().find(|e| e.key == "account").unwrap();
    assert!(account_entry.valid);
}
