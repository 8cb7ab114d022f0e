//! Dashboard Module
//!
//! HTTP API serving the dashboard frontend.

mod api;
mod types;

pub use api::create_router;
pub use types::*;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::service::DashboardService;

/// Bind and serve the dashboard API until shutdown
pub async fn serve(addr: SocketAddr, service: Arc<DashboardService>) -> Result<()> {
    let router = create_router(service);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("dashboard API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("dashboard server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
    }
}
