//! Topology observability metrics
//!
//! Prometheus-compatible metrics for:
//! - Snapshot refreshes (outcome, duration, source backend)
//! - Stale snapshots served after a failed refresh
//! - Snapshot cache hits and misses
//! - Endpoint resolutions by policy and outcome

use crate::model::ClusterState;
use std::time::{Duration, Instant};

/// Record a snapshot refresh duration
pub fn record_refresh_duration(backend: &str, duration: Duration) {
    metrics::histogram!(
        "solcloud_refresh_duration_seconds",
        "backend" => backend.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a successful snapshot refresh
pub fn record_refresh_success(backend: &str) {
    metrics::counter!(
        "solcloud_refresh_total",
        "backend" => backend.to_string(),
        "status" => "ok",
    )
    .increment(1);
}

/// Record a failed snapshot refresh
pub fn record_refresh_error(backend: &str, error_type: &str) {
    metrics::counter!(
        "solcloud_refresh_total",
        "backend" => backend.to_string(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "solcloud_refresh_errors_total",
        "backend" => backend.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record an expired snapshot handed out because its refresh failed
pub fn record_stale_served(error_type: &str) {
    metrics::counter!(
        "solcloud_stale_served_total",
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record a snapshot cache lookup
pub fn record_cache_lookup(backend: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!(
        "solcloud_cache_lookups_total",
        "backend" => backend.to_string(),
        "result" => result,
    )
    .increment(1);
}

/// Record an endpoint resolution
pub fn record_resolution(policy: &str, outcome: Result<(), &str>) {
    match outcome {
        Ok(()) => metrics::counter!(
            "solcloud_resolutions_total",
            "policy" => policy.to_string(),
            "status" => "ok",
        )
        .increment(1),
        Err(error_type) => metrics::counter!(
            "solcloud_resolutions_total",
            "policy" => policy.to_string(),
            "status" => "error",
            "error_type" => error_type.to_string(),
        )
        .increment(1),
    }
}

/// Update gauges describing the current snapshot
pub fn update_topology_gauges(state: &ClusterState) {
    let shards: usize = state.collections().values().map(|c| c.shards().len()).sum();
    let replicas: usize = state
        .collections()
        .values()
        .map(|c| c.replicas().count())
        .sum();

    metrics::gauge!("solcloud_collections").set(state.collections().len() as f64);
    metrics::gauge!("solcloud_aliases").set(state.aliases().len() as f64);
    metrics::gauge!("solcloud_shards").set(shards as f64);
    metrics::gauge!("solcloud_replicas").set(replicas as f64);
    metrics::gauge!("solcloud_live_nodes").set(state.live_nodes().len() as f64);
    metrics::gauge!("solcloud_stale_replicas").set(state.stale_replica_count() as f64);
    metrics::gauge!("solcloud_snapshot_generation").set(state.generation() as f64);
}

/// Guard for timing snapshot refreshes
pub struct RefreshTimer {
    backend: &'static str,
    start: Instant,
}

impl RefreshTimer {
    /// Start timing a refresh against `backend`
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            start: Instant::now(),
        }
    }

    /// Record success and duration
    pub fn success(self) {
        record_refresh_duration(self.backend, self.start.elapsed());
        record_refresh_success(self.backend);
    }

    /// Record error and duration
    pub fn error(self, error_type: &str) {
        record_refresh_duration(self.backend, self.start.elapsed());
        record_refresh_error(self.backend, error_type);
    }
}
