//! Coordination service source
//!
//! Reads the cluster layout the way the search nodes publish it:
//!
//! ```text
//! <chroot>/aliases.json                      alias table (optional)
//! <chroot>/collections/<name>/state.json     per-collection state
//! <chroot>/clusterstate.json                 shared state of older clusters
//! <chroot>/live_nodes/<node_name>            one ephemeral node per live server
//! ```
//!
//! The client for the coordination service itself is supplied by the caller
//! through [`CoordinationStore`].

use super::StateSource;
use crate::error::{Result, TopologyError};
use crate::wire::{self, RawTopology};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

const ALIASES: &str = "/aliases.json";
const COLLECTIONS: &str = "/collections";
const LEGACY_CLUSTER_STATE: &str = "/clusterstate.json";
const COLLECTION_STATE: &str = "state.json";
const LIVE_NODES: &str = "/live_nodes";

/// Read access to a hierarchical coordination service
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Whether a node exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Data stored at `path`, `None` if the node does not exist
    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Names of the children of `path`, `None` if the node does not exist
    async fn get_children(&self, path: &str) -> Result<Option<Vec<String>>>;
}

/// In-memory coordination tree.
///
/// Creating a node creates its missing parents with empty data.
#[derive(Default)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the node at `path`
    pub fn set(&self, path: &str, data: impl Into<Vec<u8>>) {
        let path = normalize(path);
        let mut nodes = self.nodes.write();

        let mut parent = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            parent.push('/');
            parent.push_str(segment);
            if parent != path {
                nodes.entry(parent.clone()).or_default();
            }
        }
        nodes.insert(path, data.into());
    }

    /// Remove the node at `path` and everything below it
    pub fn remove(&self, path: &str) {
        let path = normalize(path);
        let prefix = format!("{}/", path);
        self.nodes
            .write()
            .retain(|node, _| node != &path && !node.starts_with(&prefix));
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.nodes.read().contains_key(&normalize(path)))
    }

    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.nodes.read().get(&normalize(path)).cloned())
    }

    async fn get_children(&self, path: &str) -> Result<Option<Vec<String>>> {
        let path = normalize(path);
        let nodes = self.nodes.read();
        if !nodes.contains_key(&path) {
            return Ok(None);
        }

        let prefix = format!("{}/", path);
        let children = nodes
            .keys()
            .filter_map(|node| node.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(String::from)
            .collect();
        Ok(Some(children))
    }
}

/// Source reading the cluster layout from the coordination service
pub struct CoordinationSource {
    store: Arc<dyn CoordinationStore>,
    chroot: String,
}

impl CoordinationSource {
    /// Create a source reading below `chroot` (e.g. `/solr`), or the root when `None`
    pub fn new(store: Arc<dyn CoordinationStore>, chroot: Option<String>) -> Result<Self> {
        let chroot = match chroot {
            None => String::new(),
            Some(c) if !c.starts_with('/') => {
                return Err(TopologyError::Config(format!(
                    "chroot '{}' must start with a forward slash",
                    c
                )))
            }
            Some(c) => c.trim_end_matches('/').to_string(),
        };

        Ok(Self { store, chroot })
    }

    fn path(&self, path: &str) -> String {
        format!("{}{}", self.chroot, path)
    }

    async fn read_aliases(&self) -> Result<BTreeMap<String, String>> {
        let path = self.path(ALIASES);
        if !self.store.exists(&path).await? {
            debug!(path = %path, "No alias table");
            return Ok(BTreeMap::new());
        }
        match self.store.get_data(&path).await? {
            Some(data) => wire::decode_aliases(&path, &data),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn read_required_children(&self, path: &str) -> Result<Vec<String>> {
        let path = self.path(path);
        self.store
            .get_children(&path)
            .await?
            .ok_or_else(|| TopologyError::malformed(path, "node does not exist"))
    }

    /// Collection documents keyed by collection name from one JSON object
    async fn read_state_document(&self, path: &str) -> Result<BTreeMap<String, Value>> {
        let data = match self.store.get_data(path).await? {
            Some(data) if !data.iter().all(|b| b.is_ascii_whitespace()) => data,
            _ => return Ok(BTreeMap::new()),
        };

        match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(other) => Err(TopologyError::malformed(
                path,
                format!("expected an object, got {}", other),
            )),
            Err(e) => Err(TopologyError::malformed(path, e)),
        }
    }
}

#[async_trait]
impl StateSource for CoordinationSource {
    async fn fetch_raw_topology(&self) -> Result<RawTopology> {
        let aliases = self.read_aliases().await?;
        let names = self.read_required_children(COLLECTIONS).await?;

        let legacy = self
            .read_state_document(&self.path(LEGACY_CLUSTER_STATE))
            .await?;

        let mut collections = BTreeMap::new();
        for name in &names {
            let path = self.path(&format!("{}/{}/{}", COLLECTIONS, name, COLLECTION_STATE));
            collections.extend(self.read_state_document(&path).await?);
        }

        // Shared state from older clusters takes precedence
        for (name, document) in legacy {
            if collections.insert(name.clone(), document).is_some() {
                warn!(
                    collection = %name,
                    "Collection present in both state.json and clusterstate.json"
                );
            }
        }

        if let Some(missing) = names.iter().find(|n| !collections.contains_key(*n)) {
            return Err(TopologyError::malformed(
                self.path(&format!("{}/{}", COLLECTIONS, missing)),
                format!("no state document for collection '{}'", missing),
            ));
        }

        let live_nodes = self.read_required_children(LIVE_NODES).await?;

        debug!(
            chroot = %self.chroot,
            collections = collections.len(),
            aliases = aliases.len(),
            live_nodes = live_nodes.len(),
            "Read cluster layout from coordination service"
        );

        Ok(RawTopology {
            aliases,
            collections,
            live_nodes,
        })
    }

    fn describe(&self) -> String {
        if self.chroot.is_empty() {
            "coordination:/".to_string()
        } else {
            format!("coordination:{}", self.chroot)
        }
    }

    fn backend_name(&self) -> &'static str {
        "coordination"
    }
}
