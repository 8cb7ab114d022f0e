//! Typed errors for upstream fetches
//!
//! The service layer treats every variant the same way (degrade the
//! affected dashboard slice to "no data"), but the distinction matters
//! for logs and for tests that assert timeout handling.

use thiserror::Error;

/// Failure of a single upstream HTTP fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request exceeded its deadline
    #[error("upstream request timed out")]
    Timeout,

    /// Upstream answered with a non-2xx status
    #[error("upstream returned status {status}")]
    Upstream { status: u16 },

    /// The response body could not be decoded
    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    /// Transport-level failure (DNS, connect, TLS, ...)
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
