// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, network presets, and the
//! client configuration assembled by callers at construction time.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `LIT_NETWORK` | Named network preset (`datil-dev`, `datil-test`, `datil`) | `datil-dev` |
//! | `LIT_RELAY_URL` | Relay endpoint used by the default mint callback | unset |
//!
//! ## Network Presets
//!
//! Each preset carries the bootstrap node URLs, the default minimum node
//! count (superseded by the handshake), and HTTP timeouts. Presets are
//! exposed as constructor functions so callers can tweak them before
//! handing them to [`LitNodeClientConfig`].

use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable name for the named network preset.
pub const NETWORK_ENV: &str = "LIT_NETWORK";

/// Environment variable name for the relay endpoint used by the default
/// mint callback when claiming derived keys.
pub const RELAY_URL_ENV: &str = "LIT_RELAY_URL";

/// Default per-node HTTP timeout.
const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default whole-batch retry tolerance.
const DEFAULT_RETRY_TOLERANCE: u32 = 2;

/// A named network of threshold-signing nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LitNetwork {
    /// Network name (used in relay payloads and logs).
    pub name: &'static str,
    /// Bootstrap node URLs.
    pub bootstrap_urls: Vec<String>,
    /// Minimum number of agreeing nodes required to combine shares.
    ///
    /// The handshake value supersedes this once connected.
    pub min_node_count: usize,
}

/// The `datil-dev` development network.
pub fn datil_dev() -> LitNetwork {
    LitNetwork {
        name: "datil-dev",
        bootstrap_urls: vec![
            "https://15.235.83.220:7470".into(),
            "https://15.235.83.220:7471".into(),
            "https://15.235.83.220:7472".into(),
        ],
        min_node_count: 2,
    }
}

/// The `datil-test` test network.
pub fn datil_test() -> LitNetwork {
    LitNetwork {
        name: "datil-test",
        bootstrap_urls: vec![
            "https://15.235.40.99:7470".into(),
            "https://15.235.40.99:7471".into(),
            "https://15.235.40.99:7472".into(),
            "https://15.235.40.99:7473".into(),
            "https://15.235.40.99:7474".into(),
            "https://15.235.40.99:7475".into(),
        ],
        min_node_count: 5,
    }
}

/// The `datil` production network.
pub fn datil() -> LitNetwork {
    LitNetwork {
        name: "datil",
        bootstrap_urls: vec![
            "https://21.241.92.62:443".into(),
            "https://21.241.92.63:443".into(),
            "https://21.241.92.64:443".into(),
            "https://21.241.92.65:443".into(),
            "https://21.241.92.66:443".into(),
            "https://21.241.92.67:443".into(),
            "https://21.241.92.68:443".into(),
        ],
        min_node_count: 5,
    }
}

/// Resolve a network preset by name.
pub fn network_by_name(name: &str) -> Result<LitNetwork> {
    match name {
        "datil-dev" => Ok(datil_dev()),
        "datil-test" => Ok(datil_test()),
        "datil" => Ok(datil()),
        other => Err(Error::invalid_argument(format!(
            "unsupported network: {other}"
        ))),
    }
}

/// Resolve the network preset from `LIT_NETWORK`, defaulting to `datil-dev`.
pub fn network_from_env() -> Result<LitNetwork> {
    let name = std::env::var(NETWORK_ENV).unwrap_or_else(|_| "datil-dev".to_string());
    network_by_name(name.trim())
}

/// Client configuration.
///
/// Assembled by the caller and handed to `LitNodeClient::new`. The
/// defaults are production-sane; tests typically lower the timeouts.
#[derive(Debug, Clone)]
pub struct LitNodeClientConfig {
    /// The network to connect to.
    pub network: LitNetwork,
    /// Whole-batch retry budget for node dispatches.
    pub retry_tolerance: u32,
    /// Per-node request timeout.
    pub node_timeout: Duration,
    /// Relay endpoint for the default mint callback (claims).
    pub relay_url: Option<String>,
}

impl LitNodeClientConfig {
    /// Create a configuration for the given network with default tuning.
    pub fn new(network: LitNetwork) -> Self {
        Self {
            network,
            retry_tolerance: DEFAULT_RETRY_TOLERANCE,
            node_timeout: DEFAULT_NODE_TIMEOUT,
            relay_url: std::env::var(RELAY_URL_ENV).ok(),
        }
    }

    /// Override the retry tolerance.
    pub fn with_retry_tolerance(mut self, retry_tolerance: u32) -> Self {
        self.retry_tolerance = retry_tolerance;
        self
    }

    /// Override the per-node timeout.
    pub fn with_node_timeout(mut self, node_timeout: Duration) -> Self {
        self.node_timeout = node_timeout;
        self
    }

    /// Override the relay endpoint for the default mint callback.
    pub fn with_relay_url(mut self, relay_url: impl Into<String>) -> Self {
        self.relay_url = Some(relay_url.into());
        self
    }

    /// Validate that every bootstrap URL parses.
    pub fn validate(&self) -> Result<()> {
        if self.network.bootstrap_urls.is_empty() {
            return Err(Error::invalid_argument("network has no bootstrap URLs"));
        }
        for bootstrap in &self.network.bootstrap_urls {
            url::Url::parse(bootstrap).map_err(|e| {
                Error::invalid_argument(format!("invalid bootstrap URL {bootstrap}: {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_resolve_by_name() {
        assert_eq!(network_by_name("datil-dev").unwrap().name, "datil-dev");
        assert_eq!(network_by_name("datil-test").unwrap().min_node_count, 5);
        assert!(network_by_name("nonexistent").is_err());
    }

    #[test]
    fn config_validates_bootstrap_urls() {
        let config = LitNodeClientConfig::new(datil_dev());
        assert!(config.validate().is_ok());

        let mut broken = datil_dev();
        broken.bootstrap_urls = vec!["not a url".into()];
        assert!(LitNodeClientConfig::new(broken).validate().is_err());

        let mut empty = datil_dev();
        empty.bootstrap_urls.clear();
        assert!(LitNodeClientConfig::new(empty).validate().is_err());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = LitNodeClientConfig::new(datil_dev())
            .with_retry_tolerance(0)
            .with_node_timeout(Duration::from_millis(250))
            .with_relay_url("https://relay.example");
        assert_eq!(config.retry_tolerance, 0);
        assert_eq!(config.node_timeout, Duration::from_millis(250));
        assert_eq!(config.relay_url.as_deref(), Some("https://relay.example"));
    }
}
