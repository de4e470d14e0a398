//! Solcloud Topology - cluster-topology awareness for sharded search clusters
//!
//! This crate reads the layout of a SolrCloud-style cluster (collections,
//! shards, replicas, leaders, live nodes, aliases) and picks a concrete
//! endpoint for a request against a named collection.
//!
//! # Architecture
//!
//! - **Model**: Immutable snapshot types decoded from the cluster state documents
//! - **Source**: Pluggable snapshot sources (coordination service, HTTP cluster status, static)
//! - **Cache**: TTL snapshot cache shared between readers
//! - **Reader**: Single-flight refresh with stale serving and background refresh
//! - **Resolver**: Alias resolution and endpoint selection under a routing policy
//! - **Router**: Facade combining reader and resolver
//!
//! # Key Operations
//!
//! - resolve: collection or alias to one endpoint (`AnyActive` or `LeaderOnly`)
//! - reresolve: same, against a freshly fetched snapshot
//! - all_shard_leader_uris / all_active_uris_by_shard: per-shard enumeration
//! - endpoints / active_base_urls / stale_replicas: cluster-wide views

pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;
pub mod metrics;
pub mod model;
pub mod reader;
pub mod resolver;
pub mod router;
pub mod source;
pub mod wire;

pub use cache::{CacheStats, MemoryCache, SnapshotCache};
pub use config::{SourceConfig, TopologyConfig};
pub use error::{Result, TopologyError};
pub use freshness::{Freshness, RefreshPolicy};
pub use model::{
    ClusterState, CollectionState, Endpoint, ReplicaState, ReplicaStatus, ShardState, ShardStatus,
};
pub use reader::{ReaderOptions, Snapshot, SnapshotReader};
pub use resolver::{EndpointResolver, RoutingPolicy};
pub use router::CloudRouter;
pub use source::{
    CoordinationSource, CoordinationStore, HttpStateSource, MemoryStore, StateSource, StaticSource,
};
pub use wire::RawTopology;
