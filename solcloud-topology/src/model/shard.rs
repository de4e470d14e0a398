//! Shard state

use super::replica::ReplicaState;
use crate::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStatus {
    /// Normal state of a shard
    Active,
    /// Parent shard after a successful split
    Inactive,
    /// Sub-shard while a split is in progress
    Construction,
    /// Sub-shard creating replicas to reach the replication factor
    Recovery,
    /// Sub-shard of a split the overseer deemed failed
    RecoveryFailed,
}

impl ShardStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ShardStatus::Active),
            "inactive" => Some(ShardStatus::Inactive),
            "construction" => Some(ShardStatus::Construction),
            "recovery" => Some(ShardStatus::Recovery),
            "recovery_failed" => Some(ShardStatus::RecoveryFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStatus::Active => "active",
            ShardStatus::Inactive => "inactive",
            ShardStatus::Construction => "construction",
            ShardStatus::Recovery => "recovery",
            ShardStatus::RecoveryFailed => "recovery_failed",
        }
    }
}

impl std::fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One hash-range partition of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ShardFields")]
pub struct ShardState {
    name: String,
    range: String,
    status: ShardStatus,
    replicas: BTreeMap<String, ReplicaState>,
    leader_id: Option<String>,
}

impl ShardState {
    /// Build a shard, checking that it has replicas and at most one leader.
    ///
    /// `collection` is only used to give errors their context.
    pub fn new(
        collection: &str,
        name: impl Into<String>,
        range: impl Into<String>,
        status: ShardStatus,
        replicas: BTreeMap<String, ReplicaState>,
    ) -> Result<Self> {
        let name = name.into();
        let location = format!("collection '{}' shard '{}'", collection, name);
        let leader_id = elect_leader(&location, &replicas)?;

        Ok(Self {
            name,
            range: range.into(),
            status,
            replicas,
            leader_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash range, opaque to this layer
    pub fn range(&self) -> &str {
        &self.range
    }

    pub fn status(&self) -> ShardStatus {
        self.status
    }

    pub fn replicas(&self) -> &BTreeMap<String, ReplicaState> {
        &self.replicas
    }

    pub fn replica(&self, id: &str) -> Option<&ReplicaState> {
        self.replicas.get(id)
    }

    /// Current leader, `None` while an election is in progress
    pub fn leader(&self) -> Option<&ReplicaState> {
        self.leader_id.as_ref().and_then(|id| self.replicas.get(id))
    }

    pub fn active_replicas(&self) -> impl Iterator<Item = &ReplicaState> {
        self.replicas.values().filter(|r| r.is_active())
    }

    /// Node name to base URL for every replica of this shard
    pub fn node_base_urls(&self) -> BTreeMap<String, String> {
        self.replicas
            .values()
            .map(|r| (r.node_name.clone(), r.base_url.clone()))
            .collect()
    }
}

/// Id of the single leader among `replicas`, if any
fn elect_leader(
    location: &str,
    replicas: &BTreeMap<String, ReplicaState>,
) -> Result<Option<String>> {
    if replicas.is_empty() {
        return Err(TopologyError::malformed(location, "shard has no replicas"));
    }

    let mut leader_id: Option<String> = None;
    for replica in replicas.values().filter(|r| r.is_leader) {
        if let Some(existing) = &leader_id {
            return Err(TopologyError::malformed(
                location,
                format!("replicas '{}' and '{}' both claim leadership", existing, replica.id),
            ));
        }
        leader_id = Some(replica.id.clone());
    }
    Ok(leader_id)
}

/// Serialized form of [`ShardState`]; the leader is derived again on load
#[derive(Deserialize)]
struct ShardFields {
    name: String,
    range: String,
    status: ShardStatus,
    replicas: BTreeMap<String, ReplicaState>,
}

impl TryFrom<ShardFields> for ShardState {
    type Error = TopologyError;

    fn try_from(fields: ShardFields) -> Result<Self> {
        let location = format!("shard '{}'", fields.name);
        let leader_id = elect_leader(&location, &fields.replicas)?;

        Ok(Self {
            name: fields.name,
            range: fields.range,
            status: fields.status,
            replicas: fields.replicas,
            leader_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReplicaStatus;

    fn replica(id: &str, port: u16, leader: bool, status: ReplicaStatus) -> ReplicaState {
        ReplicaState {
            id: id.into(),
            core_name: format!("c_{}", id),
            base_url: format!("http://localhost:{}/solr", port),
            node_name: format!("localhost:{}_solr", port),
            is_leader: leader,
            status,
        }
    }

    fn replicas(list: Vec<ReplicaState>) -> BTreeMap<String, ReplicaState> {
        list.into_iter().map(|r| (r.id.clone(), r)).collect()
    }

    #[test]
    fn test_leader() {
        let shard = ShardState::new(
            "c",
            "shard1",
            "0-7fffffff",
            ShardStatus::Active,
            replicas(vec![
                replica("core_node1", 8983, false, ReplicaStatus::Active),
                replica("core_node2", 8984, true, ReplicaStatus::Active),
            ]),
        )
        .unwrap();

        assert_eq!(shard.leader().unwrap().id, "core_node2");
        assert_eq!(shard.range(), "0-7fffffff");
        assert_eq!(shard.active_replicas().count(), 2);
    }

    #[test]
    fn test_no_leader() {
        let shard = ShardState::new(
            "c",
            "shard1",
            "",
            ShardStatus::Active,
            replicas(vec![replica("core_node1", 8983, false, ReplicaStatus::Down)]),
        )
        .unwrap();

        assert!(shard.leader().is_none());
        assert_eq!(shard.active_replicas().count(), 0);
    }

    #[test]
    fn test_two_leaders_rejected() {
        let err = ShardState::new(
            "c",
            "shard1",
            "",
            ShardStatus::Active,
            replicas(vec![
                replica("core_node1", 8983, true, ReplicaStatus::Active),
                replica("core_node2", 8984, true, ReplicaStatus::Active),
            ]),
        )
        .unwrap_err();

        match err {
            TopologyError::MalformedSnapshot { location, .. } => {
                assert!(location.contains("shard1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_deserialize_checks_leaders() {
        let shard = ShardState::new(
            "c",
            "shard1",
            "",
            ShardStatus::Active,
            replicas(vec![
                replica("core_node1", 8983, true, ReplicaStatus::Active),
                replica("core_node2", 8984, false, ReplicaStatus::Active),
            ]),
        )
        .unwrap();

        let mut value = serde_json::to_value(&shard).unwrap();
        let loaded: ShardState = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(loaded, shard);

        value["leader_id"] = serde_json::json!("core_node2");
        let loaded: ShardState = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(loaded.leader().unwrap().id, "core_node1");

        value["replicas"]["core_node2"]["is_leader"] = serde_json::json!(true);
        let err = serde_json::from_value::<ShardState>(value.clone()).unwrap_err();
        assert!(err.to_string().contains("both claim leadership"));

        value["replicas"] = serde_json::json!({});
        assert!(serde_json::from_value::<ShardState>(value).is_err());
    }

    #[test]
    fn test_empty_shard_rejected() {
        let err =
            ShardState::new("c", "shard1", "", ShardStatus::Active, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, TopologyError::MalformedSnapshot { .. }));
    }

    #[test]
    fn test_node_base_urls() {
        let shard = ShardState::new(
            "c",
            "shard1",
            "",
            ShardStatus::Active,
            replicas(vec![
                replica("core_node1", 8983, true, ReplicaStatus::Active),
                replica("core_node2", 8984, false, ReplicaStatus::Recovering),
            ]),
        )
        .unwrap();

        let urls = shard.node_base_urls();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls["localhost:8984_solr"], "http://localhost:8984/solr");
    }
}
