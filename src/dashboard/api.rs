//! Dashboard HTTP API
//!
//! REST endpoints for the dashboard frontend. Every handler returns the
//! `ApiResponse` envelope; a slice whose upstream is unavailable renders
//! an explicit no-data error rather than zeros, and nothing here can
//! fail the whole request.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use crate::broker::{AccountSummary, OpenPosition};
use crate::cache::CacheKeyInfo;
use crate::service::{DashboardService, ExportSummary, PortfolioChartData};
use crate::types::Fill;

/// Create the API router with all endpoints
pub fn create_router(service: Arc<DashboardService>) -> Router {
    Router::new()
        .route("/api/account", get(get_account))
        .route("/api/positions", get(get_positions))
        .route("/api/orders", get(get_orders))
        .route("/api/history", get(get_history))
        .route("/api/cache", get(get_cache))
        .route("/api/health", get(get_health))
        .route("/api/orders/export", post(export_orders))
        .with_state(service)
        // CORS for the embedded frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/account - Balances and equity
async fn get_account(State(service): State<Arc<DashboardService>>) -> impl IntoResponse {
    match service.account().await {
        Some(account) => Json(ApiResponse::success(account)),
        None => Json(ApiResponse::<AccountSummary>::no_data("account")),
    }
}

/// GET /api/positions - Open positions
async fn get_positions(State(service): State<Arc<DashboardService>>) -> impl IntoResponse {
    match service.positions().await {
        Some(positions) => Json(ApiResponse::success(positions)),
        None => Json(ApiResponse::<Vec<OpenPosition>>::no_data("positions")),
    }
}

/// GET /api/orders - Order history as normalized fills
async fn get_orders(State(service): State<Arc<DashboardService>>) -> impl IntoResponse {
    match service.fills().await {
        Some(fills) => Json(ApiResponse::success(fills)),
        None => Json(ApiResponse::<Vec<Fill>>::no_data("orders")),
    }
}

/// GET /api/history - Equity curve, position snapshots and price series
async fn get_history(State(service): State<Arc<DashboardService>>) -> impl IntoResponse {
    match service.portfolio_chart().await {
        Some(chart) => Json(ApiResponse::success(chart)),
        None => Json(ApiResponse::<PortfolioChartData>::no_data("history")),
    }
}

/// GET /api/cache - Operator-facing cache listing
async fn get_cache(State(service): State<Arc<DashboardService>>) -> impl IntoResponse {
    Json(ApiResponse::<Vec<CacheKeyInfo>>::success(
        service.cache_entries(),
    ))
}

/// GET /api/health - Liveness probe
async fn get_health(State(service): State<Arc<DashboardService>>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        cache_entries: service.cache_entries().len(),
        updated_at: Utc::now().timestamp_millis(),
    }))
}

/// POST /api/orders/export - Write the order history CSV
async fn export_orders(State(service): State<Arc<DashboardService>>) -> impl IntoResponse {
    match service.export_order_history().await {
        Ok(summary) => Json(ApiResponse::success(summary)),
        Err(err) => Json(ApiResponse::<ExportSummary>::error(err.to_string())),
    }
}
