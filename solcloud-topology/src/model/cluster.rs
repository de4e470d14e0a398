//! Cluster-wide snapshot

use super::collection::CollectionState;
use crate::error::{Result, TopologyError};
use crate::wire::{self, RawTopology};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Point-in-time view of the full cluster topology.
///
/// Never mutated after construction; a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    aliases: BTreeMap<String, String>,
    collections: BTreeMap<String, CollectionState>,
    live_nodes: BTreeSet<String>,
    generation: u64,
    fetched_at: DateTime<Utc>,
}

impl ClusterState {
    pub fn new(
        aliases: BTreeMap<String, String>,
        collections: BTreeMap<String, CollectionState>,
        live_nodes: BTreeSet<String>,
        generation: u64,
    ) -> Self {
        Self {
            aliases,
            collections,
            live_nodes,
            generation,
            fetched_at: Utc::now(),
        }
    }

    /// Decode a raw topology document. Any invalid collection fails the whole snapshot.
    pub fn decode(raw: RawTopology, generation: u64) -> Result<Self> {
        let mut collections = BTreeMap::new();
        for (name, document) in &raw.collections {
            let collection = wire::decode_collection(name, document)?;
            collections.insert(name.clone(), collection);
        }

        Ok(Self::new(
            raw.aliases,
            collections,
            raw.live_nodes.into_iter().collect(),
            generation,
        ))
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn collections(&self) -> &BTreeMap<String, CollectionState> {
        &self.collections
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionState> {
        self.collections.get(name)
    }

    pub fn live_nodes(&self) -> &BTreeSet<String> {
        &self.live_nodes
    }

    pub fn is_live(&self, node_name: &str) -> bool {
        self.live_nodes.contains(node_name)
    }

    /// Sequence number of this snapshot within the reader that produced it
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Time elapsed since this snapshot was fetched
    pub fn age(&self) -> std::time::Duration {
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }

    /// Canonical collection name for a collection or alias name.
    ///
    /// Aliases are a single hop. An alias naming several collections resolves
    /// to the first one, which is where writes go.
    pub fn resolve_name(&self, name: &str) -> Result<String> {
        self.resolve_names(name)?
            .into_iter()
            .next()
            .ok_or_else(|| TopologyError::CollectionNotFound(name.to_string()))
    }

    /// Every collection a name stands for (one, unless it is a multi-collection alias)
    pub fn resolve_names(&self, name: &str) -> Result<Vec<String>> {
        if self.collections.contains_key(name) {
            return Ok(vec![name.to_string()]);
        }

        match self.aliases.get(name) {
            Some(targets) => {
                let names: Vec<String> = targets
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                if names.is_empty() {
                    Err(TopologyError::CollectionNotFound(name.to_string()))
                } else {
                    Ok(names)
                }
            }
            None => Err(TopologyError::CollectionNotFound(name.to_string())),
        }
    }

    /// Number of replicas whose node is missing from the live-node set.
    ///
    /// A non-zero count means the snapshot lags behind the cluster.
    pub fn stale_replica_count(&self) -> usize {
        self.collections
            .values()
            .map(|c| c.stale_replicas(&self.live_nodes).count())
            .sum()
    }
}
