//! Brokerage API types
//!
//! Raw response DTOs (every numeric field arrives as a JSON string) and
//! the normalized forms the rest of the service consumes. Normalization
//! is lossy by policy: a record whose numerics or timestamps fail to
//! parse is skipped with a warning and the rest of the batch survives.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{parse_rfc3339_millis, Fill, FillSide, ValuationCheckpoint};

// ─────────────────────────────────────────────────────────────────
// Raw upstream DTOs
// ─────────────────────────────────────────────────────────────────

/// GET /v2/account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub status: String,
    pub currency: String,
    pub cash: String,
    pub equity: String,
    pub buying_power: String,
    pub portfolio_value: String,
}

/// GET /v2/positions (one element)
#[derive(Debug, Clone, Deserialize)]
pub struct PositionResponse {
    pub symbol: String,
    pub qty: String,
    pub avg_entry_price: String,
    #[serde(default)]
    pub current_price: Option<String>,
    #[serde(default)]
    pub market_value: Option<String>,
    #[serde(default)]
    pub unrealized_pl: Option<String>,
}

/// GET /v2/orders (one element)
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub symbol: String,
    pub side: String,
    pub status: String,
    #[serde(default)]
    pub qty: Option<String>,
    #[serde(default)]
    pub filled_qty: Option<String>,
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub filled_at: Option<String>,
}

/// GET /v2/account/portfolio/history
///
/// Parallel arrays; timestamps are Unix epoch seconds on this endpoint
/// (unlike the ISO-8601 strings on the order endpoints).
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioHistoryResponse {
    pub timestamp: Vec<i64>,
    pub equity: Vec<Option<f64>>,
}

// ─────────────────────────────────────────────────────────────────
// Normalized forms
// ─────────────────────────────────────────────────────────────────

/// Account balances with numerics parsed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub status: String,
    pub currency: String,
    pub cash: f64,
    pub equity: f64,
    pub buying_power: f64,
    pub portfolio_value: f64,
}

/// An open position with numerics parsed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub current_price: Option<f64>,
    pub market_value: Option<f64>,
    pub unrealized_pl: Option<f64>,
}

impl TryFrom<AccountResponse> for AccountSummary {
    type Error = String;

    fn try_from(raw: AccountResponse) -> Result<Self, Self::Error> {
        Ok(AccountSummary {
            cash: parse_field(&raw.cash, "cash")?,
            equity: parse_field(&raw.equity, "equity")?,
            buying_power: parse_field(&raw.buying_power, "buying_power")?,
            portfolio_value: parse_field(&raw.portfolio_value, "portfolio_value")?,
            status: raw.status,
            currency: raw.currency,
        })
    }
}

fn parse_field(s: &str, field: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("unparseable {} value {:?}", field, s))
}

fn parse_opt(s: &Option<String>) -> Option<f64> {
    s.as_deref().and_then(|v| v.parse::<f64>().ok())
}

/// Normalize raw positions, dropping records that fail to parse
pub fn positions_from_response(raw: Vec<PositionResponse>) -> Vec<OpenPosition> {
    raw.into_iter()
        .filter_map(|pos| {
            let quantity = match pos.qty.parse::<f64>() {
                Ok(q) => q,
                Err(_) => {
                    warn!(symbol = %pos.symbol, qty = %pos.qty, "skipping position with unparseable qty");
                    return None;
                }
            };
            let avg_entry_price = match pos.avg_entry_price.parse::<f64>() {
                Ok(p) => p,
                Err(_) => {
                    warn!(symbol = %pos.symbol, "skipping position with unparseable avg_entry_price");
                    return None;
                }
            };
            Some(OpenPosition {
                current_price: parse_opt(&pos.current_price),
                market_value: parse_opt(&pos.market_value),
                unrealized_pl: parse_opt(&pos.unrealized_pl),
                symbol: pos.symbol,
                quantity,
                avg_entry_price,
            })
        })
        .collect()
}

/// Normalize raw orders into fills, dropping records that fail to parse.
///
/// The fill quantity comes from `filled_qty` when present (partial fills)
/// and falls back to the requested `qty`. Price stays `None` for orders
/// that never filled. The timestamp prefers the fill time over the
/// submission time.
pub fn fills_from_orders(raw: Vec<OrderResponse>) -> Vec<Fill> {
    raw.into_iter()
        .filter_map(|order| {
            let side = match FillSide::from_str(&order.side) {
                Some(side) => side,
                None => {
                    warn!(id = %order.id, side = %order.side, "skipping order with unknown side");
                    return None;
                }
            };
            let quantity = match parse_opt(&order.filled_qty).or_else(|| parse_opt(&order.qty)) {
                Some(q) if q.is_finite() => q,
                _ => {
                    warn!(id = %order.id, "skipping order with unparseable quantity");
                    return None;
                }
            };
            let timestamp = match order
                .filled_at
                .as_deref()
                .or(order.submitted_at.as_deref())
                .and_then(parse_rfc3339_millis)
            {
                Some(ts) => ts,
                None => {
                    warn!(id = %order.id, "skipping order with unparseable timestamp");
                    return None;
                }
            };
            Some(Fill {
                symbol: order.symbol,
                side,
                quantity,
                price: parse_opt(&order.filled_avg_price),
                timestamp,
            })
        })
        .collect()
}

/// Zip the portfolio-history arrays into valuation checkpoints.
///
/// Epoch-second timestamps are normalized to millis; samples with a
/// missing or non-finite equity value are dropped.
pub fn checkpoints_from_history(raw: PortfolioHistoryResponse) -> Vec<ValuationCheckpoint> {
    raw.timestamp
        .into_iter()
        .zip(raw.equity)
        .filter_map(|(secs, equity)| {
            let value = equity?;
            if !value.is_finite() {
                return None;
            }
            Some(ValuationCheckpoint {
                timestamp: secs * 1000,
                value,
            })
        })
        .collect()
}
