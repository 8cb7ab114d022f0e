//! Brokerage read API
//!
//! Account balances, open positions, order history and portfolio
//! valuation history, normalized for the rest of the service.

mod rest;
mod types;

pub use rest::BrokerClient;
pub use types::*;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{Fill, ValuationCheckpoint};

/// Read-side brokerage operations the dashboard service depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Account balances and equity
    async fn account(&self) -> Result<AccountSummary, FetchError>;

    /// Currently open positions
    async fn open_positions(&self) -> Result<Vec<OpenPosition>, FetchError>;

    /// Order history normalized to fills, capped at `limit` records
    async fn order_fills(&self, limit: usize) -> Result<Vec<Fill>, FetchError>;

    /// Portfolio valuation samples over the trailing period
    async fn portfolio_history(
        &self,
        period_days: u32,
    ) -> Result<Vec<ValuationCheckpoint>, FetchError>;
}
