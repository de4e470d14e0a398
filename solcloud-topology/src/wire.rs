//! Wire shape of topology documents and their decoding into the model
//!
//! Every source adapts its backend to [`RawTopology`]. Collection documents
//! stay as JSON until decode so a failure can name the collection:
//!
//! ```text
//! collection → {replicationFactor, maxShardsPerNode, autoAddReplicas, router:{name},
//!               shards:{name → {range, state, replicas:{id → {core, base_url,
//!                                node_name, state, leader}}}}}
//! ```
//!
//! The coordination service stores numbers and booleans as strings, so both
//! encodings are accepted.

use crate::error::{Result, TopologyError};
use crate::model::{
    CollectionState, ReplicaState, ReplicaStatus, ShardState, ShardStatus, DEFAULT_ROUTER,
};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Undecoded topology as delivered by a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTopology {
    /// Alias name to target collection(s)
    pub aliases: BTreeMap<String, String>,
    /// Collection name to its state document
    pub collections: BTreeMap<String, Value>,
    /// Names of nodes currently registered as live
    pub live_nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(rename = "replicationFactor", default, deserialize_with = "lenient_u32")]
    replication_factor: Option<u32>,
    #[serde(rename = "maxShardsPerNode", default, deserialize_with = "lenient_u32")]
    max_shards_per_node: Option<u32>,
    #[serde(rename = "autoAddReplicas", default, deserialize_with = "lenient_bool")]
    auto_add_replicas: Option<bool>,
    #[serde(default)]
    router: Option<RawRouter>,
    shards: BTreeMap<String, RawShard>,
}

#[derive(Debug, Deserialize)]
struct RawRouter {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawShard {
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    state: Option<String>,
    replicas: BTreeMap<String, RawReplica>,
}

#[derive(Debug, Deserialize)]
struct RawReplica {
    core: String,
    #[serde(default)]
    base_url: Option<String>,
    node_name: String,
    state: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    leader: Option<bool>,
}

fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                de::Error::custom(format!("expected a non-negative integer, got {}", n))
            }),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid integer '{}': {}", s, e))),
        other => Err(de::Error::custom(format!("expected an integer, got {}", other))),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        Value::String(s) => match s.trim() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(de::Error::custom(format!("invalid boolean '{}'", other))),
        },
        other => Err(de::Error::custom(format!("expected a boolean, got {}", other))),
    }
}

/// Base URL for nodes whose replica entries omit `base_url`.
///
/// Node names have the form `host:port_context`, e.g. `10.0.0.5:8983_solr`.
pub fn base_url_from_node_name(node_name: &str, scheme: &str) -> String {
    match node_name.split_once('_') {
        Some((host_port, context)) if !context.is_empty() => {
            format!("{}://{}/{}", scheme, host_port, context.replace("%2F", "/"))
        }
        Some((host_port, _)) => format!("{}://{}", scheme, host_port),
        None => format!("{}://{}", scheme, node_name),
    }
}

/// Decode one collection document
pub fn decode_collection(name: &str, document: &Value) -> Result<CollectionState> {
    let location = format!("collection '{}'", name);
    let raw: RawCollection = serde_json::from_value(document.clone())
        .map_err(|e| TopologyError::malformed(location.as_str(), e))?;

    let mut shards = BTreeMap::new();
    for (shard_name, raw_shard) in raw.shards {
        let shard = decode_shard(name, &shard_name, raw_shard)?;
        shards.insert(shard_name, shard);
    }

    Ok(CollectionState::new(
        name,
        raw.replication_factor.unwrap_or(1),
        raw.max_shards_per_node.unwrap_or(1),
        raw.auto_add_replicas.unwrap_or(false),
        raw.router
            .and_then(|r| r.name)
            .unwrap_or_else(|| DEFAULT_ROUTER.to_string()),
        shards,
    ))
}

fn decode_shard(collection: &str, name: &str, raw: RawShard) -> Result<ShardState> {
    let status = match raw.state.as_deref() {
        None => ShardStatus::Active,
        Some(value) => ShardStatus::parse(value).ok_or_else(|| {
            TopologyError::malformed(
                format!("collection '{}' shard '{}'", collection, name),
                format!("unknown shard state '{}'", value),
            )
        })?,
    };

    let mut replicas = BTreeMap::new();
    for (id, raw_replica) in raw.replicas {
        let status = ReplicaStatus::parse(&raw_replica.state).ok_or_else(|| {
            TopologyError::malformed(
                format!("collection '{}' shard '{}' replica '{}'", collection, name, id),
                format!("unknown replica state '{}'", raw_replica.state),
            )
        })?;

        let base_url = raw_replica
            .base_url
            .unwrap_or_else(|| base_url_from_node_name(&raw_replica.node_name, "http"));

        replicas.insert(
            id.clone(),
            ReplicaState {
                id,
                core_name: raw_replica.core,
                base_url,
                node_name: raw_replica.node_name,
                is_leader: raw_replica.leader.unwrap_or(false),
                status,
            },
        );
    }

    ShardState::new(collection, name, raw.range.unwrap_or_default(), status, replicas)
}

/// Decode an alias document: `{"collection": {alias: target}}`.
///
/// Empty input means no aliases have been defined yet.
pub fn decode_aliases(location: &str, data: &[u8]) -> Result<BTreeMap<String, String>> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(BTreeMap::new());
    }

    let document: Value =
        serde_json::from_slice(data).map_err(|e| TopologyError::malformed(location, e))?;

    match document.get("collection") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(alias, target)| match target {
                Value::String(s) => Ok((alias.clone(), s.clone())),
                other => Err(TopologyError::malformed(
                    location,
                    format!("alias '{}' has non-string target {}", alias, other),
                )),
            })
            .collect(),
        Some(other) => Err(TopologyError::malformed(
            location,
            format!("expected an object under 'collection', got {}", other),
        )),
    }
}
