//! Replica state

use super::endpoint::collection_uri;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
    /// Ready to receive updates and queries
    Active,
    /// First state before recovering
    Down,
    /// Recovering from the shard leader
    Recovering,
    /// Recovery attempts did not succeed
    RecoveryFailed,
}

impl ReplicaStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ReplicaStatus::Active),
            "down" => Some(ReplicaStatus::Down),
            "recovering" => Some(ReplicaStatus::Recovering),
            "recovery_failed" => Some(ReplicaStatus::RecoveryFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaStatus::Active => "active",
            ReplicaStatus::Down => "down",
            ReplicaStatus::Recovering => "recovering",
            ReplicaStatus::RecoveryFailed => "recovery_failed",
        }
    }
}

impl std::fmt::Display for ReplicaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One node-hosted copy of a shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaState {
    /// Replica id, unique within its shard (e.g. core_node1)
    pub id: String,
    /// Core name on the hosting node
    pub core_name: String,
    /// Base URL of the hosting node (scheme://host:port/path)
    pub base_url: String,
    /// Identity of the hosting node as registered in the live-node set
    pub node_name: String,
    pub is_leader: bool,
    pub status: ReplicaStatus,
}

impl ReplicaState {
    pub fn is_active(&self) -> bool {
        self.status == ReplicaStatus::Active
    }

    /// URI addressing `collection` on this replica's node
    pub fn collection_uri(&self, collection: &str) -> String {
        collection_uri(&self.base_url, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        for status in [
            ReplicaStatus::Active,
            ReplicaStatus::Down,
            ReplicaStatus::Recovering,
            ReplicaStatus::RecoveryFailed,
        ] {
            assert_eq!(ReplicaStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReplicaStatus::parse("gone"), None);
    }

    #[test]
    fn test_collection_uri() {
        let replica = ReplicaState {
            id: "core_node1".into(),
            core_name: "products_shard1_replica_n1".into(),
            base_url: "http://solr1:8983/solr/".into(),
            node_name: "solr1:8983_solr".into(),
            is_leader: true,
            status: ReplicaStatus::Active,
        };
        assert!(replica.is_active());
        assert_eq!(
            replica.collection_uri("products"),
            "http://solr1:8983/solr/products/"
        );
    }
}
