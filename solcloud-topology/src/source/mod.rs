//! Cluster snapshot sources
//!
//! A source fetches the raw topology from one backend. Decoding into the model
//! happens in the reader so every backend fails the same way.
//!
//! # Backends
//!
//! - **Coordination**: walks the coordination service tree through a [`CoordinationStore`]
//! - **HTTP**: queries the CLUSTERSTATUS API of any cluster member
//! - **Static**: fixed topology, for embedding and tests
//!
//! # Example
//!
//! ```ignore
//! use solcloud_topology::config::SourceConfig;
//!
//! let config = SourceConfig::http(vec!["http://solr1:8983/solr", "http://solr2:8983/solr"]);
//! let source = config.create_source(None, Duration::from_secs(10))?;
//!
//! let raw = source.fetch_raw_topology().await?;
//! println!("{} collections from {}", raw.collections.len(), source.describe());
//! ```

mod coordination;
mod http;
mod r#static;

pub use coordination::{CoordinationSource, CoordinationStore, MemoryStore};
pub use http::{parse_cluster_status, HttpStateSource};
pub use r#static::StaticSource;

use crate::config::SourceConfig;
use crate::error::{Result, TopologyError};
use crate::wire::RawTopology;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for snapshot source implementations
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Fetch the complete raw topology in one pass
    async fn fetch_raw_topology(&self) -> Result<RawTopology>;

    /// Human-readable target of this source, used in logs and errors
    fn describe(&self) -> String;

    /// Get the source backend name
    fn backend_name(&self) -> &'static str;
}

impl SourceConfig {
    /// Create the appropriate source implementation.
    ///
    /// The coordination backend reads through `store`, which the embedding
    /// application connects to its coordination service.
    pub fn create_source(
        &self,
        store: Option<Arc<dyn CoordinationStore>>,
        timeout: Duration,
    ) -> Result<Arc<dyn StateSource>> {
        self.validate()?;
        match self {
            SourceConfig::Coordination { hosts, chroot } => {
                let store = store.ok_or_else(|| {
                    TopologyError::Config(format!(
                        "coordination backend for {} needs a coordination store",
                        hosts.join(",")
                    ))
                })?;
                Ok(Arc::new(CoordinationSource::new(store, chroot.clone())?))
            }
            SourceConfig::Http { urls } => {
                Ok(Arc::new(HttpStateSource::new(urls.clone(), timeout)?))
            }
        }
    }
}
