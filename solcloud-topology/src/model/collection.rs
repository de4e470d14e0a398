//! Collection state

use super::replica::ReplicaState;
use super::shard::ShardState;
use crate::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default routing-key algorithm when a collection document names none
pub const DEFAULT_ROUTER: &str = "compositeId";

/// One logical, shardable collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    name: String,
    replication_factor: u32,
    max_shards_per_node: u32,
    auto_add_replicas: bool,
    router_name: String,
    shards: BTreeMap<String, ShardState>,
}

impl CollectionState {
    pub fn new(
        name: impl Into<String>,
        replication_factor: u32,
        max_shards_per_node: u32,
        auto_add_replicas: bool,
        router_name: impl Into<String>,
        shards: BTreeMap<String, ShardState>,
    ) -> Self {
        Self {
            name: name.into(),
            replication_factor,
            max_shards_per_node,
            auto_add_replicas,
            router_name: router_name.into(),
            shards,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn replication_factor(&self) -> u32 {
        self.replication_factor
    }

    pub fn max_shards_per_node(&self) -> u32 {
        self.max_shards_per_node
    }

    pub fn auto_add_replicas(&self) -> bool {
        self.auto_add_replicas
    }

    /// Routing-key algorithm identifier (opaque)
    pub fn router_name(&self) -> &str {
        &self.router_name
    }

    pub fn shards(&self) -> &BTreeMap<String, ShardState> {
        &self.shards
    }

    pub fn shard(&self, name: &str) -> Option<&ShardState> {
        self.shards.get(name)
    }

    /// All replicas with the shard they belong to
    pub fn replicas(&self) -> impl Iterator<Item = (&ShardState, &ReplicaState)> {
        self.shards
            .values()
            .flat_map(|shard| shard.replicas().values().map(move |r| (shard, r)))
    }

    /// Leader of `shard`, or `LeaderUnavailable` if the shard has none
    pub fn shard_leader(&self, shard: &str) -> Result<&ReplicaState> {
        let state = self
            .shards
            .get(shard)
            .ok_or_else(|| TopologyError::CollectionNotFound(format!("{}/{}", self.name, shard)))?;
        state.leader().ok_or_else(|| TopologyError::LeaderUnavailable {
            collection: self.name.clone(),
            shard: shard.to_string(),
        })
    }

    /// Collection URIs of every active replica, deduplicated
    pub fn active_replica_uris(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.replicas()
            .filter(|(_, r)| r.is_active())
            .map(|(_, r)| r.collection_uri(&self.name))
            .filter(|uri| seen.insert(uri.clone()))
            .collect()
    }

    /// Collection URI of each shard leader, keyed by shard name.
    ///
    /// Fails with `LeaderUnavailable` naming the first shard without a leader.
    pub fn leader_uris(&self) -> Result<BTreeMap<String, String>> {
        self.shards
            .keys()
            .map(|shard| {
                let leader = self.shard_leader(shard)?;
                Ok((shard.clone(), leader.collection_uri(&self.name)))
            })
            .collect()
    }

    /// Collection URIs of active replicas per shard; every shard has an entry
    pub fn active_uris_by_shard(&self) -> BTreeMap<String, Vec<String>> {
        self.shards
            .iter()
            .map(|(name, shard)| {
                let uris = shard
                    .active_replicas()
                    .map(|r| r.collection_uri(&self.name))
                    .collect();
                (name.clone(), uris)
            })
            .collect()
    }

    /// Node name to base URL over all shards
    pub fn all_node_uris(&self) -> BTreeMap<String, String> {
        self.shards
            .values()
            .flat_map(|shard| shard.node_base_urls())
            .collect()
    }

    /// Replicas hosted on nodes missing from `live_nodes`
    pub fn stale_replicas<'a>(
        &'a self,
        live_nodes: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = (&'a ShardState, &'a ReplicaState)> + 'a {
        self.replicas()
            .filter(move |(_, r)| !live_nodes.contains(&r.node_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReplicaStatus, ShardStatus};

    fn replica(id: &str, port: u16, leader: bool, status: ReplicaStatus) -> ReplicaState {
        ReplicaState {
            id: id.into(),
            core_name: format!("products_{}", id),
            base_url: format!("http://localhost:{}/solr", port),
            node_name: format!("localhost:{}_solr", port),
            is_leader: leader,
            status,
        }
    }

    fn shard(name: &str, replicas: Vec<ReplicaState>) -> (String, ShardState) {
        let map = replicas.into_iter().map(|r| (r.id.clone(), r)).collect();
        (
            name.to_string(),
            ShardState::new("products", name, "", ShardStatus::Active, map).unwrap(),
        )
    }

    fn collection() -> CollectionState {
        let shards = vec![
            shard(
                "shard1",
                vec![
                    replica("core_node1", 8983, true, ReplicaStatus::Active),
                    replica("core_node2", 8984, false, ReplicaStatus::Active),
                ],
            ),
            shard(
                "shard2",
                vec![
                    replica("core_node3", 8984, false, ReplicaStatus::Recovering),
                    replica("core_node4", 8985, true, ReplicaStatus::Active),
                ],
            ),
        ];
        CollectionState::new("products", 2, 1, false, DEFAULT_ROUTER, shards.into_iter().collect())
    }

    #[test]
    fn test_leader_uris() {
        let leaders = collection().leader_uris().unwrap();
        assert_eq!(leaders.len(), 2);
        assert_eq!(leaders["shard1"], "http://localhost:8983/solr/products/");
        assert_eq!(leaders["shard2"], "http://localhost:8985/solr/products/");
    }

    #[test]
    fn test_active_replica_uris_deduplicated() {
        let uris = collection().active_replica_uris();
        assert_eq!(
            uris,
            vec![
                "http://localhost:8983/solr/products/".to_string(),
                "http://localhost:8984/solr/products/".to_string(),
                "http://localhost:8985/solr/products/".to_string(),
            ]
        );
    }

    #[test]
    fn test_active_uris_by_shard() {
        let by_shard = collection().active_uris_by_shard();
        assert_eq!(by_shard["shard1"].len(), 2);
        assert_eq!(by_shard["shard2"], vec!["http://localhost:8985/solr/products/"]);
    }

    #[test]
    fn test_all_node_uris() {
        let nodes = collection().all_node_uris();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes["localhost:8985_solr"], "http://localhost:8985/solr");
    }

    #[test]
    fn test_missing_leader() {
        let shards = vec![shard(
            "shard1",
            vec![replica("core_node1", 8983, false, ReplicaStatus::Down)],
        )];
        let c = CollectionState::new(
            "products",
            1,
            1,
            false,
            DEFAULT_ROUTER,
            shards.into_iter().collect(),
        );

        let err = c.leader_uris().unwrap_err();
        assert_eq!(
            err,
            TopologyError::LeaderUnavailable {
                collection: "products".into(),
                shard: "shard1".into()
            }
        );
        assert_eq!(c.active_uris_by_shard()["shard1"], Vec::<String>::new());
    }

    #[test]
    fn test_stale_replicas() {
        let live: BTreeSet<String> = ["localhost:8983_solr", "localhost:8984_solr"]
            .into_iter()
            .map(String::from)
            .collect();
        let c = collection();
        let stale: Vec<_> = c.stale_replicas(&live).map(|(_, r)| r.id.clone()).collect();
        assert_eq!(stale, vec!["core_node4".to_string()]);
    }
}
