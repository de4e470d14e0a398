//! Immutable cluster topology model
//!
//! ```text
//! ClusterState ─┬─ aliases     alias → collection
//!               ├─ live_nodes  node names
//!               └─ collections ─ CollectionState ─ shards ─ ShardState ─ replicas ─ ReplicaState
//! ```
//!
//! Values are built once per snapshot and shared behind `Arc`; nothing is
//! updated in place.

mod cluster;
mod collection;
mod endpoint;
mod replica;
mod shard;

pub use cluster::ClusterState;
pub use collection::{CollectionState, DEFAULT_ROUTER};
pub use endpoint::{collection_uri, Endpoint};
pub use replica::{ReplicaState, ReplicaStatus};
pub use shard::{ShardState, ShardStatus};
