//! Synthetic fallback price series
//!
//! When the market-data provider has no bars for a symbol, the chart
//! still needs a continuous line between the position's open and close.
//! This generator produces an hourly series: linear trend between the
//! buy price and the terminal price, a bounded sinusoidal oscillation,
//! and small seeded noise. Every point is tagged `synthetic` so no
//! consumer can mistake it for market data.
//!
//! The noise source is seeded from the symbol and buy timestamp, so the
//! same position always yields the same series.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::types::PricePoint;

const HOUR_MS: i64 = 3_600_000;

/// Terminal price gain assumed when the position was never sold
const TERMINAL_GAIN: f64 = 1.05;
/// Oscillation amplitude as a fraction of the buy price
const OSC_AMPLITUDE: f64 = 0.03;
/// Full sine cycles across the span
const OSC_CYCLES: f64 = 4.0;
/// Noise bound as a fraction of the buy price
const NOISE_AMPLITUDE: f64 = 0.01;

/// Generate an hourly synthetic price series for a symbol.
///
/// The series runs from the first BUY fill to the SELL fill, or to
/// `now_millis` with a terminal price of `1.05 * buy_price` when the
/// position is still open. The terminal point carries the terminal price
/// exactly, with no oscillation or noise applied.
pub fn generate_synthetic_series(
    symbol: &str,
    buy_ts: i64,
    buy_price: f64,
    sell: Option<(i64, f64)>,
    now_millis: i64,
) -> Vec<PricePoint> {
    let (end_ts, end_price) = match sell {
        Some((ts, price)) => (ts, price),
        None => (now_millis, buy_price * TERMINAL_GAIN),
    };

    if end_ts <= buy_ts {
        return vec![PricePoint {
            timestamp: buy_ts,
            price: end_price,
            synthetic: true,
        }];
    }

    let mut rng = StdRng::seed_from_u64(series_seed(symbol, buy_ts));
    let span = (end_ts - buy_ts) as f64;
    let mut points = Vec::with_capacity(((end_ts - buy_ts) / HOUR_MS + 2) as usize);

    let mut ts = buy_ts;
    while ts < end_ts {
        let frac = (ts - buy_ts) as f64 / span;
        let trend = buy_price + (end_price - buy_price) * frac;
        let oscillation =
            buy_price * OSC_AMPLITUDE * (std::f64::consts::TAU * OSC_CYCLES * frac).sin();
        let noise = buy_price * rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
        points.push(PricePoint {
            timestamp: ts,
            price: trend + oscillation + noise,
            synthetic: true,
        });
        ts += HOUR_MS;
    }

    points.push(PricePoint {
        timestamp: end_ts,
        price: end_price,
        synthetic: true,
    });

    points
}

fn series_seed(symbol: &str, buy_ts: i64) -> u64 {
    let mut hasher = DefaultHasher::new();
    symbol.hash(&mut hasher);
    buy_ts.hash(&mut hasher);
    hasher.finish()
}
