//! Topology error types

use thiserror::Error;

/// Errors raised while reading a cluster snapshot or resolving endpoints.
///
/// Every variant names the thing that failed (collection, alias, shard,
/// coordination path or member URL) so topology problems can be debugged from
/// the error alone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Backend unavailable ({target}): {reason}")]
    BackendUnavailable { target: String, reason: String },

    #[error("Malformed snapshot at {location}: {reason}")]
    MalformedSnapshot { location: String, reason: String },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("No leader for shard '{shard}' of collection '{collection}'")]
    LeaderUnavailable { collection: String, shard: String },

    #[error("No active replica for collection '{0}'")]
    NoActiveReplica(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TopologyError {
    pub fn backend(target: impl Into<String>, reason: impl ToString) -> Self {
        TopologyError::BackendUnavailable {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(location: impl Into<String>, reason: impl ToString) -> Self {
        TopologyError::MalformedSnapshot {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            TopologyError::BackendUnavailable { .. } => "backend_unavailable",
            TopologyError::MalformedSnapshot { .. } => "malformed_snapshot",
            TopologyError::CollectionNotFound(_) => "collection_not_found",
            TopologyError::LeaderUnavailable { .. } => "leader_unavailable",
            TopologyError::NoActiveReplica(_) => "no_active_replica",
            TopologyError::InvalidUrl { .. } => "invalid_url",
            TopologyError::Config(_) => "config",
        }
    }

    /// Whether re-resolving against a freshly fetched snapshot may succeed.
    pub fn is_topology_miss(&self) -> bool {
        matches!(
            self,
            TopologyError::CollectionNotFound(_)
                | TopologyError::LeaderUnavailable { .. }
                | TopologyError::NoActiveReplica(_)
        )
    }
}

impl From<toml::de::Error> for TopologyError {
    fn from(err: toml::de::Error) -> Self {
        TopologyError::Config(err.to_string())
    }
}

impl From<std::io::Error> for TopologyError {
    fn from(err: std::io::Error) -> Self {
        TopologyError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(err: serde_json::Error) -> Self {
        TopologyError::malformed("document", err)
    }
}

impl From<reqwest::Error> for TopologyError {
    fn from(err: reqwest::Error) -> Self {
        let target = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "http".to_string());
        TopologyError::backend(target, err)
    }
}

impl From<url::ParseError> for TopologyError {
    fn from(err: url::ParseError) -> Self {
        TopologyError::InvalidUrl {
            url: String::new(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TopologyError>;
