//! Position History Reconstruction
//!
//! Replays the account's fill history against a series of portfolio
//! valuation checkpoints to answer "what was held, per symbol, as of
//! time T" for each checkpoint. The replay is a single forward pass:
//! fills are sorted once and a cursor advances per checkpoint, carrying
//! running per-symbol counts forward instead of rescanning the fill list
//! for every checkpoint.

mod synthetic;

pub use synthetic::generate_synthetic_series;

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{Fill, PositionState, ValuationCheckpoint};

const HOUR_MS: i64 = 3_600_000;

/// Net open positions as of one checkpoint.
///
/// Symbols whose running count is exactly zero are absent, not present
/// with a zero value; downstream open/closed logic depends on presence.
/// A `BTreeMap` keeps serialization order stable so identical inputs
/// always produce identical output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSnapshot {
    /// Checkpoint time in epoch milliseconds
    pub timestamp: i64,
    /// Signed share count per open symbol (negative = short)
    pub positions: BTreeMap<String, f64>,
}

/// Replay `fills` against `checkpoints`, emitting the net share count per
/// open symbol at each checkpoint.
///
/// Neither input needs to be pre-sorted: fills and checkpoints are both
/// sorted ascending by timestamp here as an explicit normalization step.
/// Fills timestamped before the first checkpoint still count toward the
/// first checkpoint's totals; the reconstruction reflects cumulative
/// history, not just the checkpoint window. Fills with a non-finite
/// quantity are skipped and logged rather than aborting the replay.
pub fn reconstruct(
    fills: &[Fill],
    checkpoints: &[ValuationCheckpoint],
) -> Vec<PositionSnapshot> {
    let mut fills: Vec<&Fill> = fills
        .iter()
        .filter(|fill| {
            if fill.quantity.is_finite() {
                true
            } else {
                warn!(
                    symbol = %fill.symbol,
                    ts = fill.timestamp,
                    "skipping fill with non-finite quantity"
                );
                false
            }
        })
        .collect();
    fills.sort_by_key(|fill| fill.timestamp);

    let mut checkpoints: Vec<ValuationCheckpoint> = checkpoints.to_vec();
    checkpoints.sort_by_key(|cp| cp.timestamp);

    let mut state: BTreeMap<String, PositionState> = BTreeMap::new();
    let mut cursor = 0usize;
    let mut snapshots = Vec::with_capacity(checkpoints.len());

    for checkpoint in &checkpoints {
        while cursor < fills.len() && fills[cursor].timestamp <= checkpoint.timestamp {
            apply_fill(&mut state, fills[cursor]);
            cursor += 1;
        }

        let positions: BTreeMap<String, f64> = state
            .iter()
            .filter_map(|(symbol, pos)| pos.shares().map(|s| (symbol.clone(), s)))
            .collect();

        snapshots.push(PositionSnapshot {
            timestamp: checkpoint.timestamp,
            positions,
        });
    }

    snapshots
}

fn apply_fill(state: &mut BTreeMap<String, PositionState>, fill: &Fill) {
    let delta = fill.side.sign() * fill.quantity;
    let next = match state.get(&fill.symbol) {
        Some(PositionState::Open(shares)) => shares + delta,
        _ => delta,
    };
    let next_state = if next == 0.0 {
        PositionState::Closed
    } else {
        PositionState::Open(next)
    };
    state.insert(fill.symbol.clone(), next_state);
}

/// Reduce raw valuation samples to at most one checkpoint per clock hour.
///
/// A sample landing on the exact top of the hour wins its bucket;
/// otherwise the first sample encountered in the raw sequence is kept.
/// Output is sorted ascending by timestamp.
pub fn dedupe_checkpoints(samples: &[ValuationCheckpoint]) -> Vec<ValuationCheckpoint> {
    let mut by_hour: BTreeMap<i64, ValuationCheckpoint> = BTreeMap::new();

    for sample in samples {
        let bucket = sample.timestamp.div_euclid(HOUR_MS);
        let on_the_hour = sample.timestamp.rem_euclid(HOUR_MS) == 0;
        match by_hour.get(&bucket) {
            None => {
                by_hour.insert(bucket, *sample);
            }
            Some(kept) if on_the_hour && kept.timestamp.rem_euclid(HOUR_MS) != 0 => {
                by_hour.insert(bucket, *sample);
            }
            Some(_) => {}
        }
    }

    by_hour.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FillSide;

    fn fill(symbol: &str, side: FillSide, quantity: f64, ts: i64) -> Fill {
        Fill {
            symbol: symbol.to_string(),
            side,
            quantity,
            price: Some(100.0),
            timestamp: ts,
        }
    }

    fn checkpoint(ts: i64) -> ValuationCheckpoint {
        ValuationCheckpoint {
            timestamp: ts,
            value: 10_000.0,
        }
    }

    #[test]
    fn test_zero_crossing_omits_symbol() {
        let fills = vec![
            fill("AAPL", FillSide::Buy, 10.0, 0),
            fill("AAPL", FillSide::Sell, 10.0, 5 * HOUR_MS),
        ];
        let checkpoints: Vec<ValuationCheckpoint> =
            [0, 1, 3, 5, 6].iter().map(|h| checkpoint(h * HOUR_MS)).collect();

        let snapshots = reconstruct(&fills, &checkpoints);
        assert_eq!(snapshots.len(), 5);
        for snap in &snapshots[..3] {
            assert_eq!(snap.positions.get("AAPL"), Some(&10.0));
        }
        // Just closed at t=5h, stays absent afterwards
        assert!(snapshots[3].positions.is_empty());
        assert!(snapshots[4].positions.is_empty());
    }

    #[test]
    fn test_reopen_after_close() {
        let fills = vec![
            fill("TSLA", FillSide::Buy, 5.0, 0),
            fill("TSLA", FillSide::Sell, 5.0, HOUR_MS),
            fill("TSLA", FillSide::Buy, 2.0, 3 * HOUR_MS),
        ];
        let checkpoints: Vec<ValuationCheckpoint> =
            [0, 1, 2, 3].iter().map(|h| checkpoint(h * HOUR_MS)).collect();

        let snapshots = reconstruct(&fills, &checkpoints);
        assert_eq!(snapshots[0].positions.get("TSLA"), Some(&5.0));
        assert!(snapshots[1].positions.is_empty());
        assert!(snapshots[2].positions.is_empty());
        assert_eq!(snapshots[3].positions.get("TSLA"), Some(&2.0));
    }

    #[test]
    fn test_pre_window_fill_included() {
        let fills = vec![fill("MSFT", FillSide::Buy, 3.5, -10 * HOUR_MS)];
        let snapshots = reconstruct(&fills, &[checkpoint(0)]);
        assert_eq!(snapshots[0].positions.get("MSFT"), Some(&3.5));
    }

    #[test]
    fn test_unsorted_inputs_are_normalized() {
        let fills = vec![
            fill("AAPL", FillSide::Sell, 4.0, 2 * HOUR_MS),
            fill("AAPL", FillSide::Buy, 10.0, 0),
        ];
        let checkpoints = vec![checkpoint(3 * HOUR_MS), checkpoint(HOUR_MS)];

        let snapshots = reconstruct(&fills, &checkpoints);
        assert_eq!(snapshots[0].timestamp, HOUR_MS);
        assert_eq!(snapshots[0].positions.get("AAPL"), Some(&10.0));
        assert_eq!(snapshots[1].positions.get("AAPL"), Some(&6.0));
    }

    #[test]
    fn test_fractional_quantities_accumulate_unrounded() {
        let fills = vec![
            fill("VOO", FillSide::Buy, 0.25, 0),
            fill("VOO", FillSide::Buy, 0.1, 1),
        ];
        let snapshots = reconstruct(&fills, &[checkpoint(HOUR_MS)]);
        assert_eq!(snapshots[0].positions.get("VOO"), Some(&(0.25 + 0.1)));
    }

    #[test]
    fn test_short_position_has_negative_count() {
        let fills = vec![fill("GME", FillSide::Sell, 2.0, 0)];
        let snapshots = reconstruct(&fills, &[checkpoint(HOUR_MS)]);
        assert_eq!(snapshots[0].positions.get("GME"), Some(&-2.0));
    }

    #[test]
    fn test_non_finite_quantity_skipped() {
        let fills = vec![
            fill("AAPL", FillSide::Buy, f64::NAN, 0),
            fill("AAPL", FillSide::Buy, 1.0, 1),
        ];
        let snapshots = reconstruct(&fills, &[checkpoint(HOUR_MS)]);
        assert_eq!(snapshots[0].positions.get("AAPL"), Some(&1.0));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let fills = vec![
            fill("AAPL", FillSide::Buy, 10.0, 100),
            fill("TSLA", FillSide::Buy, 1.5, 200),
            fill("AAPL", FillSide::Sell, 4.0, 2 * HOUR_MS),
        ];
        let checkpoints: Vec<ValuationCheckpoint> =
            (0..5).map(|h| checkpoint(h * HOUR_MS)).collect();

        let first = reconstruct(&fills, &checkpoints);
        let second = reconstruct(&fills, &checkpoints);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_dedupe_prefers_top_of_hour() {
        let samples = vec![
            ValuationCheckpoint {
                timestamp: HOUR_MS + 600_000,
                value: 1.0,
            },
            ValuationCheckpoint {
                timestamp: HOUR_MS,
                value: 2.0,
            },
            ValuationCheckpoint {
                timestamp: HOUR_MS + 1_800_000,
                value: 3.0,
            },
        ];
        let deduped = dedupe_checkpoints(&samples);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].timestamp, HOUR_MS);
        assert_eq!(deduped[0].value, 2.0);
    }

    #[test]
    fn test_dedupe_keeps_first_encountered_otherwise() {
        let samples = vec![
            ValuationCheckpoint {
                timestamp: 2 * HOUR_MS + 900_000,
                value: 7.0,
            },
            ValuationCheckpoint {
                timestamp: 2 * HOUR_MS + 60_000,
                value: 8.0,
            },
        ];
        let deduped = dedupe_checkpoints(&samples);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].value, 7.0);
    }

    #[test]
    fn test_dedupe_output_sorted_across_hours() {
        let samples = vec![
            ValuationCheckpoint {
                timestamp: 3 * HOUR_MS,
                value: 1.0,
            },
            ValuationCheckpoint {
                timestamp: HOUR_MS,
                value: 2.0,
            },
        ];
        let deduped = dedupe_checkpoints(&samples);
        assert_eq!(deduped.len(), 2);
        assert!(deduped[0].timestamp < deduped[1].timestamp);
    }
}
