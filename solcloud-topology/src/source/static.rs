//! Static topology source
//!
//! Serves a fixed topology held in memory. The topology can be replaced at
//! runtime, which makes it useful for embedding and for exercising the reader.

use super::StateSource;
use crate::error::{Result, TopologyError};
use crate::wire::RawTopology;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Source returning whatever topology it currently holds
pub struct StaticSource {
    topology: RwLock<RawTopology>,

    /// Error returned instead of the topology while set
    failure: RwLock<Option<TopologyError>>,

    fetches: AtomicU64,
}

impl StaticSource {
    pub fn new(topology: RawTopology) -> Self {
        Self {
            topology: RwLock::new(topology),
            failure: RwLock::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    /// Replace the topology served by subsequent fetches
    pub fn set_topology(&self, topology: RawTopology) {
        *self.topology.write() = topology;
    }

    /// Make subsequent fetches fail with `error` until cleared
    pub fn set_failure(&self, error: Option<TopologyError>) {
        *self.failure.write() = error;
    }

    /// Number of fetches served so far, including failed ones
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateSource for StaticSource {
    async fn fetch_raw_topology(&self) -> Result<RawTopology> {
        let count = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self.failure.read().clone() {
            debug!(fetch = count, error = %err, "Static source failing fetch");
            return Err(err);
        }
        Ok(self.topology.read().clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }

    fn backend_name(&self) -> &'static str {
        "static"
    }
}
