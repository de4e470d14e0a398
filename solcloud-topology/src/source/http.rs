//! HTTP cluster-status source
//!
//! Asks any cluster member for the full layout:
//!
//! ```text
//! GET <member>/admin/collections?action=CLUSTERSTATUS&wt=json
//!
//! {"responseHeader": {...},
//!  "cluster": {"collections": {...}, "aliases": {...}, "live_nodes": [...]}}
//! ```
//!
//! Members are tried in random order so load spreads over the cluster; a
//! member that cannot be reached is skipped. The fetch timeout is split
//! evenly between members, so a member that accepts the connection and never
//! answers cannot use up the time left for the others.

use super::StateSource;
use crate::error::{Result, TopologyError};
use crate::wire::RawTopology;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Source querying the cluster-status API of the configured members
pub struct HttpStateSource {
    urls: Vec<String>,
    client: reqwest::Client,
    member_timeout: Duration,
}

impl HttpStateSource {
    /// Create a source over member base URLs (e.g. `http://solr1:8983/solr`).
    ///
    /// `timeout` bounds one whole fetch across all members.
    pub fn new(urls: Vec<String>, timeout: Duration) -> Result<Self> {
        if urls.is_empty() {
            return Err(TopologyError::Config("no cluster member URL specified".into()));
        }

        let urls = urls
            .into_iter()
            .map(|raw| {
                url::Url::parse(&raw).map_err(|e| TopologyError::InvalidUrl {
                    url: raw.clone(),
                    reason: e.to_string(),
                })?;
                Ok(raw.trim_end_matches('/').to_string())
            })
            .collect::<Result<Vec<_>>>()?;

        let members = u32::try_from(urls.len()).unwrap_or(u32::MAX);
        let member_timeout = timeout / members;

        let client = reqwest::Client::builder()
            .timeout(member_timeout)
            .build()
            .map_err(|e| TopologyError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            urls,
            client,
            member_timeout,
        })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Time one member gets to answer before the next is tried
    pub fn member_timeout(&self) -> Duration {
        self.member_timeout
    }

    async fn fetch_from(&self, base_url: &str) -> Result<RawTopology> {
        let endpoint = format!("{}/admin/collections", base_url);
        let response = self
            .client
            .get(&endpoint)
            .query(&[("action", "CLUSTERSTATUS"), ("wt", "json")])
            .send()
            .await
            .map_err(|e| TopologyError::backend(base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TopologyError::backend(
                base_url,
                format!("cluster status returned HTTP {}", status),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TopologyError::malformed(endpoint.as_str(), e))?;

        parse_cluster_status(&endpoint, &body)
    }
}

/// Extract the raw topology from a CLUSTERSTATUS response body
pub fn parse_cluster_status(location: &str, body: &Value) -> Result<RawTopology> {
    let cluster = body
        .get("cluster")
        .and_then(Value::as_object)
        .ok_or_else(|| TopologyError::malformed(location, "response has no 'cluster' object"))?;

    let collections = match cluster.get("collections") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(other) => {
            return Err(TopologyError::malformed(
                location,
                format!("'collections' is not an object: {}", other),
            ))
        }
    };

    let aliases = match cluster.get("aliases") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(alias, target)| {
                target
                    .as_str()
                    .map(|t| (alias.clone(), t.to_string()))
                    .ok_or_else(|| {
                        TopologyError::malformed(
                            location,
                            format!("alias '{}' has non-string target {}", alias, target),
                        )
                    })
            })
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(TopologyError::malformed(
                location,
                format!("'aliases' is not an object: {}", other),
            ))
        }
    };

    let live_nodes = match cluster.get("live_nodes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(nodes)) => nodes
            .iter()
            .map(|node| {
                node.as_str().map(String::from).ok_or_else(|| {
                    TopologyError::malformed(location, format!("invalid live node {}", node))
                })
            })
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(TopologyError::malformed(
                location,
                format!("'live_nodes' is not an array: {}", other),
            ))
        }
    };

    Ok(RawTopology {
        aliases,
        collections,
        live_nodes,
    })
}

#[async_trait]
impl StateSource for HttpStateSource {
    async fn fetch_raw_topology(&self) -> Result<RawTopology> {
        let mut order: Vec<&String> = self.urls.iter().collect();
        order.shuffle(&mut rand::rng());

        let mut last_error = None;
        for base_url in order {
            match self.fetch_from(base_url).await {
                Ok(raw) => {
                    debug!(
                        member = %base_url,
                        collections = raw.collections.len(),
                        "Fetched cluster status"
                    );
                    return Ok(raw);
                }
                Err(e @ TopologyError::BackendUnavailable { .. }) => {
                    warn!(
                        member = %base_url,
                        error = %e,
                        "Cluster member unavailable, trying next"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no members configured".to_string());
        Err(TopologyError::backend(self.describe(), reason))
    }

    fn describe(&self) -> String {
        self.urls.join(",")
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_cluster_status() {
        let body = json!({
            "responseHeader": {"status": 0, "QTime": 3},
            "cluster": {
                "collections": {
                    "collection1": {
                        "pullReplicas": "0",
                        "replicationFactor": "1",
                        "shards": {},
                        "znodeVersion": 7,
                        "configName": "_default"
                    }
                },
                "aliases": {"alias1": "collection1"},
                "live_nodes": ["localhost:8983_solr", "localhost:8984_solr"]
            }
        });

        let raw = parse_cluster_status("test", &body).unwrap();
        assert_eq!(raw.collections.len(), 1);
        assert_eq!(raw.aliases["alias1"], "collection1");
        assert_eq!(raw.live_nodes.len(), 2);
    }

    #[test]
    fn test_parse_without_aliases() {
        let body = json!({"cluster": {"collections": {}, "live_nodes": []}});
        let raw = parse_cluster_status("test", &body).unwrap();
        assert!(raw.aliases.is_empty());
        assert!(raw.collections.is_empty());
    }

    #[test]
    fn test_parse_missing_cluster() {
        let err = parse_cluster_status("http://solr1/admin/collections", &json!({"error": {}}))
            .unwrap_err();
        match err {
            TopologyError::MalformedSnapshot { location, .. } => {
                assert_eq!(location, "http://solr1/admin/collections");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_new_validates_urls() {
        assert!(HttpStateSource::new(vec![], Duration::from_secs(1)).is_err());
        assert!(matches!(
            HttpStateSource::new(vec!["::bad".into()], Duration::from_secs(1)),
            Err(TopologyError::InvalidUrl { .. })
        ));

        let source =
            HttpStateSource::new(vec!["http://localhost:8983/solr/".into()], Duration::from_secs(1))
                .unwrap();
        assert_eq!(source.urls(), ["http://localhost:8983/solr".to_string()]);
    }

    #[test]
    fn test_timeout_split_between_members() {
        let urls = vec![
            "http://solr1:8983/solr".to_string(),
            "http://solr2:8983/solr".to_string(),
            "http://solr3:8983/solr".to_string(),
        ];
        let source = HttpStateSource::new(urls, Duration::from_millis(900)).unwrap();
        assert_eq!(source.member_timeout(), Duration::from_millis(300));

        let single =
            HttpStateSource::new(vec!["http://solr1:8983/solr".into()], Duration::from_secs(2))
                .unwrap();
        assert_eq!(single.member_timeout(), Duration::from_secs(2));
    }
}
