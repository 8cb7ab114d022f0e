//! Response Cache
//!
//! Process-wide TTL cache for upstream API responses, keyed by a request
//! fingerprint (logical source + canonicalized parameters). Account,
//! position and order data get a short TTL; historical price bars get a
//! long one. Entries are whole-value replacements: a `put` overwrites the
//! prior payload as a unit, so concurrent refreshes can waste a duplicate
//! fetch but can never produce a merged value.
//!
//! The cache is an explicit object handed to request handlers via `Arc`,
//! not a module-level singleton, and it never raises errors: a miss means
//! "caller must fetch fresh", nothing more.

use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Time source, injectable so tests can step across TTL boundaries
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Which TTL bucket a key falls into, resolvable from the key string alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Account / position / order data
    Short,
    /// Historical price bars
    Long,
}

impl TtlClass {
    /// Classify a cache key by its naming convention
    pub fn classify(key: &str) -> Self {
        if key.starts_with("bars:") {
            TtlClass::Long
        } else {
            TtlClass::Short
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: serde_json::Value,
    stored_at: i64,
}

/// One row of the operator-facing cache listing
#[derive(Debug, Clone, Serialize)]
pub struct CacheKeyInfo {
    pub key: String,
    pub age_ms: i64,
    pub valid: bool,
}

/// TTL-bounded key/value store for upstream response payloads
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    short_ttl: Duration,
    long_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(short_ttl: Duration, long_ttl: Duration) -> Self {
        Self::with_clock(short_ttl, long_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(short_ttl: Duration, long_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            short_ttl,
            long_ttl,
            clock,
        }
    }

    /// TTL applied to a key, from the key string alone
    pub fn ttl_for(&self, key: &str) -> Duration {
        match TtlClass::classify(key) {
            TtlClass::Short => self.short_ttl,
            TtlClass::Long => self.long_ttl,
        }
    }

    /// Return the cached payload iff it exists and is younger than its TTL.
    ///
    /// `None` is not an error; it signals that the caller must fetch
    /// fresh. Expired entries are left in place (no eviction; the cache
    /// resets only with the process).
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        let age = self.clock.now_millis() - entry.stored_at;
        if age < self.ttl_for(key).as_millis() as i64 {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store a payload, overwriting any prior entry for the key
    pub fn put(&self, key: &str, payload: serde_json::Value) {
        let entry = CacheEntry {
            payload,
            stored_at: self.clock.now_millis(),
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry);
    }

    /// Snapshot of current keys with age and validity, for debugging
    pub fn entries(&self) -> Vec<CacheKeyInfo> {
        let now = self.clock.now_millis();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut infos: Vec<CacheKeyInfo> = entries
            .iter()
            .map(|(key, entry)| {
                let age_ms = now - entry.stored_at;
                CacheKeyInfo {
                    valid: age_ms < self.ttl_for(key).as_millis() as i64,
                    age_ms,
                    key: key.clone(),
                }
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }
}

// ─────────────────────────────────────────────────────────────────
// Key construction
// ─────────────────────────────────────────────────────────────────
//
// Keys are deterministic concatenations of the logical source name and
// canonicalized parameters (symbols uppercased, dates rendered date-only),
// so semantically identical requests always collide and different ones
// never do.

pub fn account_key() -> String {
    "account".to_string()
}

pub fn positions_key() -> String {
    "positions".to_string()
}

pub fn orders_key(status: &str) -> String {
    format!("orders:{}", status.to_lowercase())
}

pub fn portfolio_history_key(period_days: u32) -> String {
    format!("portfolio_history:{}d", period_days)
}

pub fn bars_key(symbol: &str, start_ms: i64, end_ms: i64) -> String {
    format!(
        "bars:{}:{}:{}",
        symbol.to_uppercase(),
        date_only(start_ms),
        date_only(end_ms)
    )
}

fn date_only(ts_millis: i64) -> String {
    match Utc.timestamp_millis_opt(ts_millis).single() {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => ts_millis.to_string(),
    }
}
