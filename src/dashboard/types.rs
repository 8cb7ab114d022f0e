//! Dashboard API Types
//!
//! DTOs for HTTP communication with the frontend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }

    /// Explicit no-data marker for a degraded slice, so the frontend can
    /// render "no data" instead of an empty chart that looks like zero
    pub fn no_data(slice: &str) -> Self {
        Self::error(format!("no data: {} unavailable", slice))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache_entries: usize,
    pub updated_at: i64,
}
