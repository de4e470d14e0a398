//! Snapshot cache
//!
//! Holds decoded snapshots under a fixed key so readers sharing a cache skip
//! the backend while the entry is within its TTL.

use crate::model::ClusterState;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for snapshot cache implementations
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Snapshot stored under `key`, if present and not expired
    async fn get(&self, key: &str) -> Option<Arc<ClusterState>>;

    /// Store `state` under `key` for `ttl`
    async fn set(&self, key: &str, state: Arc<ClusterState>, ttl: Duration);

    /// Get the cache backend name
    fn backend_name(&self) -> &'static str;
}

struct CacheEntry {
    state: Arc<ClusterState>,
    expires_at: Instant,
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// In-process TTL cache
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    stats: CacheStats,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Drop the entry stored under `key`
    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Arc<ClusterState>> {
        let now = Instant::now();
        let found = self
            .entries
            .read()
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| Arc::clone(&entry.state));

        match found {
            Some(state) => {
                self.stats.hit();
                Some(state)
            }
            None => {
                self.stats.miss();
                self.entries
                    .write()
                    .retain(|_, entry| entry.expires_at > now);
                None
            }
        }
    }

    async fn set(&self, key: &str, state: Arc<ClusterState>, ttl: Duration) {
        let entry = CacheEntry {
            state,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key.to_string(), entry);
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
