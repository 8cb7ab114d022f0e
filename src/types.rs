//! Core types used throughout PaperDash
//!
//! Defines common data structures for fills, checkpoints, positions and
//! price points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an order fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillSide {
    Buy,
    Sell,
}

impl FillSide {
    /// Signed multiplier applied to the fill quantity during replay
    pub fn sign(&self) -> f64 {
        match self {
            FillSide::Buy => 1.0,
            FillSide::Sell => -1.0,
        }
    }

    /// Parse from the upstream order representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(FillSide::Buy),
            "sell" => Some(FillSide::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for FillSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillSide::Buy => write!(f, "BUY"),
            FillSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A completed or pending order execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Ticker symbol
    pub symbol: String,
    /// Buy or sell
    pub side: FillSide,
    /// Number of shares (non-negative; fractional allowed)
    pub quantity: f64,
    /// Fill price, None while unfilled/pending
    pub price: Option<f64>,
    /// Execution/submission time in epoch milliseconds
    pub timestamp: i64,
}

/// A timestamped portfolio valuation sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationCheckpoint {
    /// Sample time in epoch milliseconds
    pub timestamp: i64,
    /// Total portfolio value at that time
    pub value: f64,
}

/// Per-symbol position state carried through replay.
///
/// A symbol whose running count returns to exactly zero is Closed and
/// stays out of emitted snapshots until a later fill reopens it. Closed
/// is a distinct variant rather than a zero count so "closed" can never
/// be confused with "open with zero shares".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PositionState {
    /// Net signed share count (negative = short)
    Open(f64),
    Closed,
}

impl PositionState {
    pub fn shares(&self) -> Option<f64> {
        match self {
            PositionState::Open(shares) => Some(*shares),
            PositionState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PositionState::Open(_))
    }
}

/// A single point on a price series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Closing price for the hour
    pub price: f64,
    /// True when generated by the fallback series rather than market data
    pub synthetic: bool,
}

/// Parse an ISO-8601 / RFC 3339 timestamp string to epoch milliseconds.
///
/// The brokerage API mixes ISO-8601 strings and Unix-epoch-seconds
/// integers across endpoints; everything downstream works in millis.
/// Epoch-second fields arrive as typed integers and are scaled where
/// they are read.
pub fn parse_rfc3339_millis(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_sign() {
        assert_eq!(FillSide::Buy.sign(), 1.0);
        assert_eq!(FillSide::Sell.sign(), -1.0);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(FillSide::from_str("buy"), Some(FillSide::Buy));
        assert_eq!(FillSide::from_str("SELL"), Some(FillSide::Sell));
        assert_eq!(FillSide::from_str("hold"), None);
    }

    #[test]
    fn test_parse_timestamp_iso() {
        assert_eq!(
            parse_rfc3339_millis("2024-03-01T14:30:00Z"),
            Some(1709303400000)
        );
        assert_eq!(
            parse_rfc3339_millis("2024-03-01T14:30:00-05:00"),
            Some(1709321400000)
        );
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert_eq!(parse_rfc3339_millis("not a date"), None);
    }

    #[test]
    fn test_position_state_shares() {
        assert_eq!(PositionState::Open(10.5).shares(), Some(10.5));
        assert_eq!(PositionState::Closed.shares(), None);
        assert!(!PositionState::Closed.is_open());
    }
}
