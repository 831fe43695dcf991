//! Connector configuration and connection-string parsing.
//!
//! A connection string is a gateway URL optionally followed by session
//! properties in query form:
//!
//! ```text
//! http://localhost:8083?execution.runtime-mode=batch&parallelism.default=4
//! ```
use crate::error::{FlinkError, Result};
use crate::operation::PollConfig;

use std::collections::BTreeMap;
use url::form_urlencoded;


pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8083";
pub const DEFAULT_API_VERSION: &str = "v3";

/// Everything a [`Connector`](crate::Connector) needs to reach the gateway.
#[derive(Clone, Debug)]
pub struct ConnConfig {
    pub gateway_url: String,
    /// Shared HTTP transport; TLS, proxies and socket timeouts are set here.
    pub client: reqwest::Client,
    pub api_version: String,
    /// Session properties sent when the session is opened.
    pub properties: BTreeMap<String, String>,
    pub poll: PollConfig,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            client: reqwest::Client::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            properties: BTreeMap::new(),
            poll: PollConfig::default(),
        }
    }
}

impl ConnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from a connection string.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let (gateway_url, properties) = split_dsn(dsn)?;
        Ok(Self::default()
            .with_gateway_url(gateway_url)
            .with_properties(properties))
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Merge `properties` into the current ones; on collision the new value wins.
    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.properties = merge_properties(std::mem::take(&mut self.properties), properties);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }
}

/// Split a connection string into the gateway URL and its session properties.
pub fn split_dsn(dsn: &str) -> Result<(String, BTreeMap<String, String>)> {
    let dsn = dsn.trim();
    if dsn.is_empty() {
        return Err(FlinkError::Config("Empty connection string".to_string()));
    }

    match dsn.split_once('?') {
        Some((url, query)) => Ok((url.to_string(), parse_properties(query)?)),
        None => Ok((dsn.to_string(), BTreeMap::new())),
    }
}

/// Parse `k1=v1&k2=v2` into a property map.
///
/// Keys and values are percent-decoded. A repeated key keeps its last value.
/// Empty segments are skipped; a segment without `=` or with an empty key
/// is rejected.
pub fn parse_properties(query: &str) -> Result<BTreeMap<String, String>> {
    let mut properties = BTreeMap::new();

    for segment in query.split('&').filter(|s| !s.is_empty()) {
        if !segment.contains('=') {
            return Err(FlinkError::Config(format!(
                "Invalid connection property '{}': expected key=value",
                segment
            )));
        }
        let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
            continue;
        };
        if key.trim().is_empty() {
            return Err(FlinkError::Config(format!(
                "Invalid connection property '{}': empty key",
                segment
            )));
        }
        properties.insert(key.into_owned(), value.into_owned());
    }

    Ok(properties)
}

/// Merge two property maps; entries of `overrides` win on collision.
pub fn merge_properties(
    mut base: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    base.extend(overrides);
    base
}
