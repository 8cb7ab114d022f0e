//! Brokerage REST API client
//!
//! HTTP communication with the paper-trading account API. Every request
//! carries an explicit timeout; a timeout is reported as a fetch failure
//! like any other, so a hung upstream can never pin a dashboard request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{
    checkpoints_from_history, fills_from_orders, positions_from_response, AccountResponse,
    AccountSummary, OpenPosition, OrderResponse, PortfolioHistoryResponse, PositionResponse,
};
use super::BrokerApi;
use crate::error::FetchError;
use crate::types::{Fill, ValuationCheckpoint};

const KEY_ID_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_KEY_HEADER: &str = "APCA-API-SECRET-KEY";

/// Page size for order-history requests
const ORDERS_PAGE: usize = 500;

/// REST client for the brokerage read API
pub struct BrokerClient {
    client: Client,
    base_url: String,
}

impl BrokerClient {
    /// Create a new client with credential headers and a request timeout
    pub fn new(
        base_url: &str,
        key_id: &str,
        secret_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            KEY_ID_HEADER,
            HeaderValue::from_str(key_id).context("Invalid API key id header value")?,
        );
        headers.insert(
            SECRET_KEY_HEADER,
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

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Upstream {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Raw account record
    pub async fn get_account(&self) -> Result<AccountResponse, FetchError> {
        self.get_json("/v2/account").await
    }

    /// Raw open positions
    pub async fn get_positions(&self) -> Result<Vec<PositionResponse>, FetchError> {
        self.get_json("/v2/positions").await
    }

    /// Raw order history, newest first, paged until `limit` records
    pub async fn get_orders(
        &self,
        status: &str,
        limit: usize,
    ) -> Result<Vec<OrderResponse>, FetchError> {
        let mut orders: Vec<OrderResponse> = Vec::new();
        let mut until: Option<String> = None;

        while orders.len() < limit {
            let page_limit = ORDERS_PAGE.min(limit - orders.len());
            let page = self
                .get_orders_page(status, page_limit, until.as_deref())
                .await?;
            let full_page = page.len() == page_limit;
            // The oldest record's submission time is the cursor for the
            // next page; `until` is exclusive upstream, so no record
            // repeats across pages.
            until = page.last().and_then(|order| order.submitted_at.clone());
            orders.extend(page);
            if !full_page || until.is_none() {
                break;
            }
        }

        Ok(orders)
    }

    /// A single page of order history
    pub async fn get_orders_page(
        &self,
        status: &str,
        limit: usize,
        until: Option<&str>,
    ) -> Result<Vec<OrderResponse>, FetchError> {
        let base = format!(
            "/v2/orders?status={}&limit={}&direction=desc",
            status,
            limit.max(1)
        );
        let path = match until {
            Some(ts) => format!("{base}&until={ts}"),
            None => base,
        };
        self.get_json(&path).await
    }

    /// Raw portfolio valuation history at hourly resolution
    pub async fn get_portfolio_history(
        &self,
        period_days: u32,
    ) -> Result<PortfolioHistoryResponse, FetchError> {
        let path = format!(
            "/v2/account/portfolio/history?period={}D&timeframe=1H",
            period_days
        );
        self.get_json(&path).await
    }
}

#[async_trait]
impl BrokerApi for BrokerClient {
    async fn account(&self) -> Result<AccountSummary, FetchError> {
        let raw = self.get_account().await?;
        AccountSummary::try_from(raw).map_err(FetchError::Decode)
    }

    async fn open_positions(&self) -> Result<Vec<OpenPosition>, FetchError> {
        Ok(positions_from_response(self.get_positions().await?))
    }

    async fn order_fills(&self, limit: usize) -> Result<Vec<Fill>, FetchError> {
        Ok(fills_from_orders(self.get_orders("closed", limit).await?))
    }

    async fn portfolio_history(
        &self,
        period_days: u32,
    ) -> Result<Vec<ValuationCheckpoint>, FetchError> {
        Ok(checkpoints_from_history(
            self.get_portfolio_history(period_days).await?,
        ))
    }
}
