//! CSV Export Module
//!
//! Writes the normalized order history to a spreadsheet-friendly CSV
//! under the configured data directory.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::Fill;

/// Order-history row for CSV storage
#[derive(Debug, Clone, Serialize)]
pub struct FillRecord {
    pub timestamp: i64,
    pub datetime: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub price: Option<f64>,
}

impl From<&Fill> for FillRecord {
    fn from(fill: &Fill) -> Self {
        let datetime = Utc
            .timestamp_millis_opt(fill.timestamp)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        Self {
            timestamp: fill.timestamp,
            datetime,
            symbol: fill.symbol.clone(),
            side: fill.side.to_string(),
            quantity: fill.quantity,
            price: fill.price,
        }
    }
}

/// CSV writer rooted at a data directory
pub struct CsvPersistence {
    data_dir: PathBuf,
}

impl CsvPersistence {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    /// Write the full order history to `orders.csv`, replacing any prior
    /// export. Returns the file path.
    pub fn write_order_history(&self, fills: &[Fill]) -> Result<PathBuf> {
        let path = self.data_dir.join("orders.csv");
        let mut writer = WriterBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        for fill in fills {
            writer
                .serialize(FillRecord::from(fill))
                .context("Failed to write order record")?;
        }
        writer.flush().context("Failed to flush order export")?;

        info!(rows = fills.len(), path = %path.display(), "exported order history");
        Ok(path)
    }
}
