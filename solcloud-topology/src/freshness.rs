//! Snapshot staleness policy
//!
//! ```text
//! Fresh ──(age ≥ ttl)──► Stale ──refresh ok──► Fresh
//!                          │
//!                          └──refresh failed, serve_stale──► StaleServed
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How current the snapshot handed to a caller is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Within its TTL
    Fresh,
    /// Past its TTL; the next read refreshes it
    Stale,
    /// Past its TTL and returned because the refresh failed
    StaleServed,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::StaleServed => "stale_served",
        }
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// When a snapshot must be re-fetched and what happens if that fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub ttl: Duration,
    pub serve_stale: bool,
}

impl RefreshPolicy {
    pub fn new(ttl: Duration, serve_stale: bool) -> Self {
        Self { ttl, serve_stale }
    }

    /// Classify a snapshot of the given age
    pub fn classify(&self, age: Duration) -> Freshness {
        if age < self.ttl {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    /// Whether a snapshot of this age must be refreshed before use
    pub fn needs_refresh(&self, age: Duration) -> bool {
        self.classify(age) != Freshness::Fresh
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), true)
    }
}
