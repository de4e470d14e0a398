//! Endpoint resolution over one snapshot
//!
//! Resolution is synchronous and lock-free: it only reads the immutable
//! [`ClusterState`] it was built over.

use crate::error::{Result, TopologyError};
use crate::model::{ClusterState, CollectionState, Endpoint, ReplicaState};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Which replicas may serve a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// Any active replica of any shard (reads)
    #[default]
    AnyActive,
    /// Shard leaders only (writes)
    LeaderOnly,
}

impl RoutingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingPolicy::AnyActive => "any_active",
            RoutingPolicy::LeaderOnly => "leader_only",
        }
    }
}

impl std::fmt::Display for RoutingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Picks serving endpoints from a snapshot
#[derive(Debug, Clone, Copy)]
pub struct EndpointResolver<'a> {
    state: &'a ClusterState,
}

impl<'a> EndpointResolver<'a> {
    pub fn new(state: &'a ClusterState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &'a ClusterState {
        self.state
    }

    fn collection(&self, name: &str) -> Result<&'a CollectionState> {
        self.state
            .collection(name)
            .filter(|c| !c.shards().is_empty())
            .ok_or_else(|| TopologyError::CollectionNotFound(name.to_string()))
    }

    /// Replicas eligible to serve `collection` under `policy`
    pub fn candidates(
        &self,
        collection: &str,
        policy: RoutingPolicy,
    ) -> Result<Vec<&'a ReplicaState>> {
        let state = self.collection(collection)?;

        match policy {
            RoutingPolicy::AnyActive => {
                let active: Vec<_> = state
                    .replicas()
                    .map(|(_, replica)| replica)
                    .filter(|replica| replica.is_active())
                    .collect();
                if active.is_empty() {
                    return Err(TopologyError::NoActiveReplica(collection.to_string()));
                }
                Ok(active)
            }
            RoutingPolicy::LeaderOnly => state
                .shards()
                .keys()
                .map(|shard| state.shard_leader(shard))
                .collect(),
        }
    }

    /// Pick one endpoint for `collection` uniformly at random among the candidates
    pub fn resolve(&self, collection: &str, policy: RoutingPolicy) -> Result<Endpoint> {
        self.resolve_with_rng(collection, policy, &mut rand::rng())
    }

    /// [`resolve`](Self::resolve) with a caller-supplied random source
    pub fn resolve_with_rng<R: Rng + ?Sized>(
        &self,
        collection: &str,
        policy: RoutingPolicy,
        rng: &mut R,
    ) -> Result<Endpoint> {
        let candidates = self.candidates(collection, policy)?;
        let chosen = candidates[rng.random_range(0..candidates.len())];

        debug!(
            collection,
            policy = %policy,
            candidates = candidates.len(),
            replica = %chosen.id,
            node = %chosen.node_name,
            "Resolved endpoint"
        );

        Endpoint::from_base_url(&chosen.base_url, collection)
    }

    /// Collection URI of every shard leader, keyed by shard
    pub fn all_shard_leader_uris(&self, collection: &str) -> Result<BTreeMap<String, String>> {
        self.collection(collection)?.leader_uris()
    }

    /// Collection URIs of the active replicas of every shard, keyed by shard
    pub fn all_active_uris_by_shard(
        &self,
        collection: &str,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.collection(collection)?.active_uris_by_shard())
    }

    /// One `AnyActive` endpoint per collection; collections with none are left out
    pub fn endpoints(&self) -> BTreeMap<String, Endpoint> {
        let mut rng = rand::rng();
        self.state
            .collections()
            .keys()
            .filter_map(|name| {
                match self.resolve_with_rng(name, RoutingPolicy::AnyActive, &mut rng) {
                    Ok(endpoint) => Some((name.clone(), endpoint)),
                    Err(e) => {
                        debug!(collection = %name, error = %e, "No endpoint for collection");
                        None
                    }
                }
            })
            .collect()
    }

    /// Deduplicated base URLs of active replicas, for one collection or all
    pub fn active_base_urls(&self, collection: Option<&str>) -> Result<Vec<String>> {
        let collections: Vec<&CollectionState> = match collection {
            Some(name) => vec![self.collection(name)?],
            None => self.state.collections().values().collect(),
        };

        let mut seen = BTreeSet::new();
        Ok(collections
            .into_iter()
            .flat_map(|c| c.replicas())
            .filter(|(_, r)| r.is_active())
            .map(|(_, r)| r.base_url.clone())
            .filter(|url| seen.insert(url.clone()))
            .collect())
    }

    /// Replicas of `collection` hosted on nodes that are not live
    pub fn stale_replicas(&self, collection: &str) -> Result<Vec<&'a ReplicaState>> {
        let state = self.collection(collection)?;
        Ok(state
            .stale_replicas(self.state.live_nodes())
            .map(|(_, replica)| replica)
            .collect())
    }
}
