//! Topology configuration

use crate::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main topology configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopologyConfig {
    /// Where cluster snapshots are read from
    #[serde(default)]
    pub source: SourceConfig,

    /// Key under which snapshots are stored in the snapshot cache
    #[serde(default = "default_cache_key")]
    pub cache_key: String,

    /// Snapshot time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Upper bound for a single snapshot fetch in milliseconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    /// Keep serving an expired snapshot when a refresh fails
    #[serde(default = "default_true")]
    pub serve_stale: bool,

    /// Refresh the snapshot in the background at this interval (disabled when unset)
    #[serde(default)]
    pub background_refresh_secs: Option<u64>,
}

fn default_cache_key() -> String {
    "solcloud.cluster_state".to_string()
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            cache_key: default_cache_key(),
            cache_ttl_secs: default_cache_ttl(),
            fetch_timeout_ms: default_fetch_timeout(),
            serve_stale: default_true(),
            background_refresh_secs: None,
        }
    }
}

impl TopologyConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TopologyError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: TopologyConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            return Err(TopologyError::Config(
                "fetch_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.cache_key.is_empty() {
            return Err(TopologyError::Config("cache_key must not be empty".into()));
        }
        if self.background_refresh_secs == Some(0) {
            return Err(TopologyError::Config(
                "background_refresh_secs must be greater than zero".into(),
            ));
        }
        self.source.validate()
    }

    /// Get snapshot TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Get fetch timeout as Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Get background refresh interval, if enabled
    pub fn background_refresh(&self) -> Option<Duration> {
        self.background_refresh_secs.map(Duration::from_secs)
    }
}

/// Snapshot source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Read directly from the coordination service
    Coordination {
        /// Coordination service members (host:port)
        hosts: Vec<String>,

        /// Optional chroot under which the cluster keeps its state (e.g. /solr)
        #[serde(default)]
        chroot: Option<String>,
    },

    /// Query the cluster-status API of any cluster member
    Http {
        /// Base URLs of cluster members (e.g. http://localhost:8983/solr)
        urls: Vec<String>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Http {
            urls: vec!["http://localhost:8983/solr".to_string()],
        }
    }
}

impl SourceConfig {
    /// Create coordination source configuration
    pub fn coordination<S: Into<String>>(hosts: Vec<S>) -> Self {
        SourceConfig::Coordination {
            hosts: hosts.into_iter().map(|s| s.into()).collect(),
            chroot: None,
        }
    }

    /// Create HTTP source configuration
    pub fn http<S: Into<String>>(urls: Vec<S>) -> Self {
        SourceConfig::Http {
            urls: urls.into_iter().map(|s| s.into()).collect(),
        }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        match self {
            SourceConfig::Coordination { .. } => "coordination",
            SourceConfig::Http { .. } => "http",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::Coordination { hosts, chroot } => {
                if hosts.is_empty() {
                    return Err(TopologyError::Config(
                        "no coordination host specified".into(),
                    ));
                }
                if let Some(chroot) = chroot {
                    if !chroot.starts_with('/') {
                        return Err(TopologyError::Config(format!(
                            "chroot '{}' must start with a forward slash",
                            chroot
                        )));
                    }
                }
                Ok(())
            }
            SourceConfig::Http { urls } => {
                if urls.is_empty() {
                    return Err(TopologyError::Config("no cluster member URL specified".into()));
                }
                for raw in urls {
                    url::Url::parse(raw).map_err(|e| TopologyError::InvalidUrl {
                        url: raw.clone(),
                        reason: e.to_string(),
                    })?;
                }
                Ok(())
            }
        }
    }

    /// Connection string for the coordination service: `h1:2181,h2:2181/chroot`.
    ///
    /// For the HTTP backend the member URLs are joined the same way.
    pub fn connection_string(&self) -> String {
        match self {
            SourceConfig::Coordination { hosts, chroot } => {
                let mut joined = hosts.join(",");
                if let Some(chroot) = chroot {
                    joined.push_str(chroot);
                }
                joined
            }
            SourceConfig::Http { urls } => urls.join(","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TopologyConfig::default();
        assert_eq!(config.cache_key, "solcloud.cluster_state");
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert!(config.serve_stale);
        assert!(config.background_refresh().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_string() {
        let source = SourceConfig::Coordination {
            hosts: vec!["127.0.0.1:2181".into(), "127.0.0.1:2182".into()],
            chroot: Some("/solr".into()),
        };
        assert_eq!(source.connection_string(), "127.0.0.1:2181,127.0.0.1:2182/solr");

        let source = SourceConfig::coordination(vec!["zk1:2181"]);
        assert_eq!(source.connection_string(), "zk1:2181");
    }

    #[test]
    fn test_invalid_chroot() {
        let source = SourceConfig::Coordination {
            hosts: vec!["zk1:2181".into()],
            chroot: Some("solr".into()),
        };
        assert!(matches!(source.validate(), Err(TopologyError::Config(_))));
    }

    #[test]
    fn test_empty_sources_rejected() {
        assert!(SourceConfig::coordination(Vec::<String>::new()).validate().is_err());
        assert!(SourceConfig::http(Vec::<String>::new()).validate().is_err());
        assert!(matches!(
            SourceConfig::http(vec!["not a url"]).validate(),
            Err(TopologyError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = TopologyConfig {
            fetch_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml() {
        let config: TopologyConfig = toml::from_str(
            r#"
            cache_ttl_secs = 5
            serve_stale = false

            [source]
            backend = "coordination"
            hosts = ["zk1:2181", "zk2:2181"]
            chroot = "/solr"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_ttl_secs, 5);
        assert!(!config.serve_stale);
        assert_eq!(config.fetch_timeout_ms, 10_000);
        assert_eq!(config.source.backend_name(), "coordination");
        assert_eq!(config.source.connection_string(), "zk1:2181,zk2:2181/solr");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.toml");
        std::fs::write(
            &path,
            r#"
            [source]
            backend = "http"
            urls = ["http://solr1:8983/solr"]
            "#,
        )
        .unwrap();

        let config = TopologyConfig::load(&path).unwrap();
        assert_eq!(config.source, SourceConfig::http(vec!["http://solr1:8983/solr"]));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TopologyConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, TopologyError::Config(_)));
    }
}
