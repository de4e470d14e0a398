//! Cloud router
//!
//! Entry point for request execution: turns a collection or alias name into a
//! concrete endpoint. Every call draws exactly one snapshot from the reader
//! and resolves against it, so a single answer never mixes two snapshots.

use crate::cache::{MemoryCache, SnapshotCache};
use crate::config::TopologyConfig;
use crate::error::{Result, TopologyError};
use crate::metrics;
use crate::model::{ClusterState, CollectionState, Endpoint, ReplicaState};
use crate::reader::{ReaderOptions, SnapshotReader};
use crate::resolver::{EndpointResolver, RoutingPolicy};
use crate::source::CoordinationStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves collection names to endpoints over a refreshing snapshot
#[derive(Clone)]
pub struct CloudRouter {
    reader: SnapshotReader,
}

impl CloudRouter {
    pub fn new(reader: SnapshotReader) -> Self {
        Self { reader }
    }

    /// Build source, cache and reader from configuration.
    ///
    /// `store` is required for the coordination backend. Starting the
    /// background refresh needs a running Tokio runtime.
    pub fn from_config(
        config: &TopologyConfig,
        store: Option<Arc<dyn CoordinationStore>>,
    ) -> Result<Self> {
        config.validate()?;

        let source = config.source.create_source(store, config.fetch_timeout())?;
        let cache: Arc<dyn SnapshotCache> = Arc::new(MemoryCache::new());
        let reader = SnapshotReader::new(source, Some(cache), ReaderOptions::from(config));

        if let Some(interval) = config.background_refresh() {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(TopologyError::Config(
                    "background refresh requires a running Tokio runtime".into(),
                ));
            }
            reader.start_background_refresh(interval);
        }

        info!(
            backend = config.source.backend_name(),
            target = %config.source.connection_string(),
            ttl_secs = config.cache_ttl_secs,
            serve_stale = config.serve_stale,
            "Cloud router configured"
        );

        Ok(Self::new(reader))
    }

    pub fn reader(&self) -> &SnapshotReader {
        &self.reader
    }

    /// Current snapshot, refreshed first if expired
    pub async fn cluster_state(&self) -> Result<Arc<ClusterState>> {
        self.reader.fetch_cluster_state().await
    }

    /// Pick an endpoint for a collection or alias under `policy`
    pub async fn resolve(&self, name: &str, policy: RoutingPolicy) -> Result<Endpoint> {
        let state = self.reader.fetch_cluster_state().await?;
        resolve_in(&state, name, policy)
    }

    /// Resolve again against a freshly fetched snapshot.
    ///
    /// For callers that saw `LeaderUnavailable`, `CollectionNotFound` or an
    /// unreachable endpoint. If the refresh fails, `AnyActive` falls back to
    /// the snapshot already held while `LeaderOnly` returns the refresh error.
    pub async fn reresolve(&self, name: &str, policy: RoutingPolicy) -> Result<Endpoint> {
        let state = match self.reader.force_refresh().await {
            Ok(state) => state,
            Err(err) => match (policy, self.reader.current()) {
                (RoutingPolicy::AnyActive, Some(stale)) => {
                    metrics::record_stale_served(err.error_type());
                    warn!(
                        name,
                        generation = stale.generation(),
                        error = %err,
                        "Re-resolution refresh failed, using stale snapshot"
                    );
                    stale
                }
                _ => {
                    metrics::record_resolution(policy.as_str(), Err(err.error_type()));
                    return Err(err);
                }
            },
        };
        resolve_in(&state, name, policy)
    }

    /// Canonical collection name for a collection or alias
    pub async fn resolve_name(&self, name: &str) -> Result<String> {
        self.reader.fetch_cluster_state().await?.resolve_name(name)
    }

    /// All collections a name stands for
    pub async fn resolve_names(&self, name: &str) -> Result<Vec<String>> {
        self.reader.fetch_cluster_state().await?.resolve_names(name)
    }

    pub async fn all_shard_leader_uris(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let state = self.reader.fetch_cluster_state().await?;
        let collection = state.resolve_name(name)?;
        EndpointResolver::new(&state).all_shard_leader_uris(&collection)
    }

    pub async fn all_active_uris_by_shard(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let state = self.reader.fetch_cluster_state().await?;
        let collection = state.resolve_name(name)?;
        EndpointResolver::new(&state).all_active_uris_by_shard(&collection)
    }

    /// One endpoint per collection that currently has an active replica
    pub async fn endpoints(&self) -> Result<BTreeMap<String, Endpoint>> {
        let state = self.reader.fetch_cluster_state().await?;
        Ok(EndpointResolver::new(&state).endpoints())
    }

    /// Base URLs of active replicas for a collection or alias, or for the whole cluster
    pub async fn active_base_urls(&self, name: Option<&str>) -> Result<Vec<String>> {
        let state = self.reader.fetch_cluster_state().await?;
        let collection = name.map(|n| state.resolve_name(n)).transpose()?;
        EndpointResolver::new(&state).active_base_urls(collection.as_deref())
    }

    /// Replicas of a collection hosted on nodes that are not live
    pub async fn stale_replicas(&self, name: &str) -> Result<Vec<ReplicaState>> {
        let state = self.reader.fetch_cluster_state().await?;
        let collection = state.resolve_name(name)?;
        Ok(EndpointResolver::new(&state)
            .stale_replicas(&collection)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// State of a collection or alias target
    pub async fn collection_state(&self, name: &str) -> Result<CollectionState> {
        let state = self.reader.fetch_cluster_state().await?;
        let collection = state.resolve_name(name)?;
        state
            .collection(&collection)
            .cloned()
            .ok_or(TopologyError::CollectionNotFound(collection))
    }
}

fn resolve_in(state: &ClusterState, name: &str, policy: RoutingPolicy) -> Result<Endpoint> {
    let result = state
        .resolve_name(name)
        .and_then(|collection| EndpointResolver::new(state).resolve(&collection, policy));

    metrics::record_resolution(
        policy.as_str(),
        result.as_ref().map(|_| ()).map_err(|e| e.error_type()),
    );
    result
}
