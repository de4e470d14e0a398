//! Snapshot reader
//!
//! Owns the current [`ClusterState`] and decides when to fetch a new one.
//!
//! ```text
//! fetch_cluster_state
//!   ├─ current snapshot fresh ─────────────► return it
//!   ├─ shared cache holds a fresh one ─────► adopt and return it
//!   └─ refresh (one in flight, callers share the result)
//!        ├─ ok ─────────────────────────────► publish, cache, return
//!        └─ failed, serve_stale, have one ──► return the expired snapshot (StaleServed)
//! ```
//!
//! The current snapshot stays readable while a refresh runs; publishing swaps
//! the `Arc` in one step, so callers never observe a partial update.

use crate::cache::SnapshotCache;
use crate::config::TopologyConfig;
use crate::error::{Result, TopologyError};
use crate::freshness::{Freshness, RefreshPolicy};
use crate::metrics::{self, RefreshTimer};
use crate::model::ClusterState;
use crate::source::StateSource;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<Arc<ClusterState>>>>;

/// Reader settings, usually taken from [`TopologyConfig`]
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub cache_key: String,
    pub policy: RefreshPolicy,
    pub fetch_timeout: Duration,
}

impl From<&TopologyConfig> for ReaderOptions {
    fn from(config: &TopologyConfig) -> Self {
        Self {
            cache_key: config.cache_key.clone(),
            policy: RefreshPolicy::new(config.cache_ttl(), config.serve_stale),
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::from(&TopologyConfig::default())
    }
}

/// A snapshot together with how current it was when handed out
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: Arc<ClusterState>,
    pub freshness: Freshness,
}

#[derive(Clone)]
struct Slot {
    state: Arc<ClusterState>,
    stale_served: bool,
}

struct ReaderInner {
    source: Arc<dyn StateSource>,
    cache: Option<Arc<dyn SnapshotCache>>,
    options: ReaderOptions,

    current: RwLock<Option<Slot>>,
    inflight: Mutex<Option<SharedRefresh>>,
    generation: AtomicU64,

    running: AtomicBool,
    task_handle: RwLock<Option<JoinHandle<()>>>,
}

/// Reads cluster snapshots from a source, caching and refreshing them
#[derive(Clone)]
pub struct SnapshotReader {
    inner: Arc<ReaderInner>,
}

impl SnapshotReader {
    pub fn new(
        source: Arc<dyn StateSource>,
        cache: Option<Arc<dyn SnapshotCache>>,
        options: ReaderOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ReaderInner {
                source,
                cache,
                options,
                current: RwLock::new(None),
                inflight: Mutex::new(None),
                generation: AtomicU64::new(0),
                running: AtomicBool::new(false),
                task_handle: RwLock::new(None),
            }),
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.inner.options
    }

    pub fn source(&self) -> &Arc<dyn StateSource> {
        &self.inner.source
    }

    /// Current cluster snapshot, refreshed first if it has expired
    pub async fn fetch_cluster_state(&self) -> Result<Arc<ClusterState>> {
        self.snapshot().await.map(|s| s.state)
    }

    /// Like [`fetch_cluster_state`](Self::fetch_cluster_state), also reporting freshness
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let policy = self.inner.options.policy;

        if let Some(slot) = self.inner.slot() {
            if !policy.needs_refresh(slot.state.age()) {
                return Ok(Snapshot {
                    state: slot.state,
                    freshness: Freshness::Fresh,
                });
            }
        }

        if let Some(state) = self.inner.cached().await {
            if !policy.needs_refresh(state.age()) {
                self.inner.publish(Arc::clone(&state));
                return Ok(Snapshot {
                    state,
                    freshness: Freshness::Fresh,
                });
            }
        }

        match ReaderInner::refresh(&self.inner).await {
            Ok(state) => Ok(Snapshot {
                state,
                freshness: Freshness::Fresh,
            }),
            Err(err) => match self.inner.slot() {
                Some(slot) if policy.serve_stale => {
                    self.inner.mark_stale_served();
                    metrics::record_stale_served(err.error_type());
                    warn!(
                        generation = slot.state.generation(),
                        age_secs = slot.state.age().as_secs(),
                        error = %err,
                        "Refresh failed, serving stale snapshot"
                    );
                    Ok(Snapshot {
                        state: slot.state,
                        freshness: Freshness::StaleServed,
                    })
                }
                _ => Err(err),
            },
        }
    }

    /// Fetch a new snapshot now, bypassing TTL and cache.
    ///
    /// Joins a refresh already in flight. Failure is returned as is; the
    /// previous snapshot stays current.
    pub async fn force_refresh(&self) -> Result<Arc<ClusterState>> {
        ReaderInner::refresh(&self.inner).await
    }

    /// Snapshot currently held, without any I/O
    pub fn current(&self) -> Option<Arc<ClusterState>> {
        self.inner.slot().map(|slot| slot.state)
    }

    /// Freshness of the snapshot currently held
    pub fn freshness(&self) -> Option<Freshness> {
        let slot = self.inner.slot()?;
        let freshness = self.inner.options.policy.classify(slot.state.age());
        if freshness == Freshness::Stale && slot.stale_served {
            Some(Freshness::StaleServed)
        } else {
            Some(freshness)
        }
    }

    /// Refresh the snapshot every `interval` until stopped or the reader is dropped
    pub fn start_background_refresh(&self, interval: Duration) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let weak: Weak<ReaderInner> = Arc::downgrade(&self.inner);
        let describe = self.inner.source.describe();

        let handle = tokio::spawn(async move {
            info!(
                source = %describe,
                interval_secs = interval.as_secs(),
                "Starting background snapshot refresh"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }

                if let Err(e) = ReaderInner::refresh(&inner).await {
                    warn!(source = %describe, error = %e, "Background snapshot refresh failed");
                }
            }

            debug!(source = %describe, "Background snapshot refresh stopped");
        });

        *self.inner.task_handle.write() = Some(handle);
    }

    pub fn stop_background_refresh(&self) {
        self.inner.stop();
    }

    pub fn is_background_refresh_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl ReaderInner {
    fn slot(&self) -> Option<Slot> {
        self.current.read().clone()
    }

    fn mark_stale_served(&self) {
        if let Some(slot) = self.current.write().as_mut() {
            slot.stale_served = true;
        }
    }

    async fn cached(&self) -> Option<Arc<ClusterState>> {
        let cache = self.cache.as_ref()?;
        let found = cache.get(&self.options.cache_key).await;
        metrics::record_cache_lookup(cache.backend_name(), found.is_some());
        found
    }

    /// Make `state` the current snapshot unless a newer one is already held.
    ///
    /// A snapshot adopted from the shared cache may carry a generation from
    /// another reader; the local counter never falls behind it.
    fn publish(&self, state: Arc<ClusterState>) {
        self.generation.fetch_max(state.generation(), Ordering::SeqCst);

        let mut current = self.current.write();
        if let Some(slot) = current.as_ref() {
            if Arc::ptr_eq(&slot.state, &state) || slot.state.fetched_at() > state.fetched_at() {
                return;
            }
        }
        *current = Some(Slot {
            state,
            stale_served: false,
        });
    }

    /// Start a refresh or join the one in flight
    async fn refresh(this: &Arc<Self>) -> Result<Arc<ClusterState>> {
        let refresh = {
            let mut inflight = this.inflight.lock();
            match inflight.as_ref() {
                Some(refresh) => {
                    debug!("Joining snapshot refresh in flight");
                    refresh.clone()
                }
                None => {
                    let inner = Arc::clone(this);
                    let refresh = async move {
                        let result = inner.fetch_and_publish().await;
                        *inner.inflight.lock() = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *inflight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    async fn fetch_and_publish(&self) -> Result<Arc<ClusterState>> {
        let backend = self.source.backend_name();
        let timer = RefreshTimer::new(backend);

        match self.fetch().await {
            Ok(state) => {
                timer.success();
                Ok(state)
            }
            Err(e) => {
                timer.error(e.error_type());
                warn!(
                    backend,
                    source = %self.source.describe(),
                    error = %e,
                    "Snapshot refresh failed"
                );
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<Arc<ClusterState>> {
        let timeout = self.options.fetch_timeout;
        let raw = tokio::time::timeout(timeout, self.source.fetch_raw_topology())
            .await
            .map_err(|_| {
                TopologyError::backend(
                    self.source.describe(),
                    format!("fetch timed out after {}ms", timeout.as_millis()),
                )
            })??;

        let generation = self.generation.load(Ordering::SeqCst) + 1;
        let state = Arc::new(ClusterState::decode(raw, generation)?);
        self.generation.store(generation, Ordering::SeqCst);

        let stale = state.stale_replica_count();
        if stale > 0 {
            warn!(
                generation,
                stale_replicas = stale,
                "Snapshot references replicas on nodes that are not live"
            );
        }

        if let Some(cache) = &self.cache {
            cache
                .set(&self.options.cache_key, Arc::clone(&state), self.options.policy.ttl)
                .await;
        }

        *self.current.write() = Some(Slot {
            state: Arc::clone(&state),
            stale_served: false,
        });
        metrics::update_topology_gauges(&state);

        info!(
            generation,
            collections = state.collections().len(),
            aliases = state.aliases().len(),
            live_nodes = state.live_nodes().len(),
            "Published cluster snapshot"
        );

        Ok(state)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task_handle.write().take() {
            handle.abort();
        }
    }
}

impl Drop for ReaderInner {
    fn drop(&mut self) {
        self.stop();
    }
}
