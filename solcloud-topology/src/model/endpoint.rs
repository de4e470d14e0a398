//! Resolved network endpoint

use crate::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};

/// URI addressing `collection` under a node's base URL: `<base_url>/<collection>/`
pub fn collection_uri(base_url: &str, collection: &str) -> String {
    format!("{}/{}/", base_url.trim_end_matches('/'), collection)
}

/// A concrete endpoint serving one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    /// Explicit port, `None` when the base URL relies on the scheme default
    pub port: Option<u16>,
    /// Path of the node's base URL without trailing slash (e.g. /solr)
    pub path: String,
    pub collection: String,
    uri: String,
}

impl Endpoint {
    /// Parse a replica base URL into an endpoint for `collection`
    pub fn from_base_url(base_url: &str, collection: &str) -> Result<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| TopologyError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let host = parsed
            .host_str()
            .ok_or_else(|| TopologyError::InvalidUrl {
                url: base_url.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            host,
            port: parsed.port(),
            path: parsed.path().trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            uri: collection_uri(base_url, collection),
        })
    }

    /// Full URI of the collection on this endpoint
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn port_or_default(&self) -> u16 {
        self.port
            .unwrap_or(if self.scheme == "https" { 443 } else { 80 })
    }

    /// Base URL of the serving node, without the collection segment
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.scheme, self.host, port, self.path),
            None => format!("{}://{}{}", self.scheme, self.host, self.path),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}
