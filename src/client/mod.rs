// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Node Client
//!
//! The coordinator every operation hangs off: it owns the connection
//! snapshot, the dispatcher, and the persistence adapter, and exposes the
//! operation surface (sessions, execution, signing, encryption, claims).
//!
//! ## Lifecycle
//!
//! ```text
//! Unconnected ──connect()──▶ Connecting ──handshake quorum──▶ Ready
//!      ▲                                                        │
//!      └────────────────────── disconnect() ◀────────────────────┘
//! ```
//!
//! Every request made while not `Ready` fails with
//! `node_client_not_ready`. Connecting performs a handshake against each
//! bootstrap node and requires a quorum that agrees on the network keys;
//! the agreed snapshot (subnet key, key set, minimum node count, epoch,
//! latest blockhash, node list) backs all later operations.

mod claim;
mod encryption;
mod execute;
mod jwt;
mod pkp;
mod session;

pub use claim::{ClaimKeyIdParams, MintCallback};
pub use encryption::{ConditionSet, DecryptParams, EncryptParams};
pub use execute::ExecuteJsParams;
pub use jwt::SigningAccessControlParams;
pub use pkp::PkpSignParams;
pub use session::{
    GetLitActionSessionSigsParams, GetPkpSessionSigsParams, GetSessionSigsParams,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::AuthNeededCallback;
use crate::config::LitNodeClientConfig;
use crate::crypto;
use crate::error::{Error, Result};
use crate::network::{HttpTransport, NodeDispatcher, Transport};
use crate::storage::{MemoryStorage, PersistenceAdapter};

/// Client lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No connection attempted yet (or disconnected).
    Unconnected,
    /// Handshake in flight.
    Connecting,
    /// Connected; operations are available.
    Ready,
}

/// What a node reports during the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeResponse {
    /// The subnet BLS public key, hex.
    subnet_pub_key: String,
    /// The network BLS public key set, hex.
    network_pub_key_set: String,
    /// Latest chain blockhash observed by the node.
    #[serde(default)]
    latest_blockhash: String,
    /// Current staking epoch.
    #[serde(default)]
    epoch: u64,
    /// Minimum node count the network enforces for share combination.
    #[serde(default)]
    min_node_count: Option<usize>,
    /// Root public keys for derived-key claims.
    #[serde(default)]
    hd_root_pubkeys: Vec<String>,
}

/// The agreed network view established by [`LitNodeClient::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    /// Subnet BLS public key, hex.
    pub subnet_pub_key: String,
    /// Network BLS public key set, hex.
    pub network_pub_key_set: String,
    /// Minimum number of agreeing nodes for share combination.
    pub min_node_count: usize,
    /// Current staking epoch.
    pub current_epoch_number: u64,
    /// Latest chain blockhash (SIWE nonce source).
    pub latest_blockhash: String,
    /// Node URLs that answered the handshake.
    pub connected_nodes: Vec<String>,
    /// Root public keys for derived-key claims.
    pub hd_root_pubkeys: Vec<String>,
}

/// Client-side coordinator for the threshold-signing network.
pub struct LitNodeClient {
    pub(crate) config: LitNodeClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) storage: Arc<dyn PersistenceAdapter>,
    pub(crate) dispatcher: NodeDispatcher,
    pub(crate) default_auth_callback: Option<AuthNeededCallback>,
    state: ClientState,
    snapshot: Option<ConnectionSnapshot>,
}

impl LitNodeClient {
    /// Create an unconnected client with the default transport and
    /// in-memory persistence.
    pub fn new(config: LitNodeClientConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.node_timeout));
        Self::with_parts(config, transport, Arc::new(MemoryStorage::new()))
    }

    /// Create a client over explicit transport and persistence
    /// implementations.
    pub fn with_parts(
        config: LitNodeClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn PersistenceAdapter>,
    ) -> Self {
        let dispatcher = NodeDispatcher::new(
            transport.clone(),
            config.retry_tolerance,
            config.node_timeout,
        );
        Self {
            config,
            transport,
            storage,
            dispatcher,
            default_auth_callback: None,
            state: ClientState::Unconnected,
            snapshot: None,
        }
    }

    /// Install a fallback wallet-signature provider, consulted when a
    /// call site supplies none.
    pub fn with_default_auth_callback(mut self, callback: AuthNeededCallback) -> Self {
        self.default_auth_callback = Some(callback);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Whether operations are available.
    pub fn is_ready(&self) -> bool {
        self.state == ClientState::Ready
    }

    /// The connection snapshot, or a readiness error.
    pub(crate) fn ready(&self) -> Result<&ConnectionSnapshot> {
        match (&self.state, &self.snapshot) {
            (ClientState::Ready, Some(snapshot)) => Ok(snapshot),
            _ => Err(Error::not_ready(
                "client is not connected; call connect() first",
            )),
        }
    }

    /// The latest chain blockhash from the snapshot.
    pub fn latest_blockhash(&self) -> Result<String> {
        Ok(self.ready()?.latest_blockhash.clone())
    }

    /// The node URLs that answered the handshake.
    pub fn connected_nodes(&self) -> Result<Vec<String>> {
        Ok(self.ready()?.connected_nodes.clone())
    }

    /// Perform the handshake against every bootstrap node and go Ready.
    ///
    /// Requires a quorum of nodes that agree on the network keys; a
    /// partial quorum with disagreeing keys fails the connection.
    pub async fn connect(&mut self) -> Result<()> {
        self.config.validate()?;
        self.state = ClientState::Connecting;
        self.snapshot = None;

        let urls = self.config.network.bootstrap_urls.clone();
        let min_count = self.config.network.min_node_count.min(urls.len());
        let batch = match self
            .dispatcher
            .dispatch(&urls, "/web/handshake", min_count, |_url| {
                Ok(serde_json::json!({ "clientPublicKey": "test" }))
            })
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                self.state = ClientState::Unconnected;
                return Err(e);
            }
        };

        let mut parsed: Vec<(String, HandshakeResponse)> = Vec::new();
        for response in &batch.responses {
            match serde_json::from_value::<HandshakeResponse>(response.value.clone()) {
                Ok(handshake) => parsed.push((response.url.clone(), handshake)),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "malformed handshake response");
                }
            }
        }

        // Consensus over the network keys: take the largest agreeing
        // group, lexicographic tie-break.
        let winner = crypto::most_common(parsed, |(_, handshake)| {
            format!(
                "{}|{}|{}",
                handshake.subnet_pub_key,
                handshake.network_pub_key_set,
                handshake.hd_root_pubkeys.join(",")
            )
        });
        let Some(winner) = winner else {
            self.state = ClientState::Unconnected;
            return Err(Error::node_request("no parseable handshake responses", vec![])
                .with_request_id(batch.request_id));
        };
        if winner.count < min_count {
            self.state = ClientState::Unconnected;
            return Err(Error::node_request(
                format!(
                    "nodes disagree on network keys: {} of {} agree, {} required",
                    winner.count,
                    batch.responses.len(),
                    min_count
                ),
                vec![],
            )
            .with_request_id(batch.request_id));
        }
        if !winner.unanimous {
            tracing::warn!("some nodes disagree on network keys; using the majority view");
        }

        let (_, agreed) = &winner.value;
        let connected_nodes: Vec<String> =
            batch.responses.iter().map(|r| r.url.clone()).collect();
        let min_node_count = agreed
            .min_node_count
            .unwrap_or(self.config.network.min_node_count);

        self.snapshot = Some(ConnectionSnapshot {
            subnet_pub_key: agreed.subnet_pub_key.clone(),
            network_pub_key_set: agreed.network_pub_key_set.clone(),
            min_node_count,
            current_epoch_number: agreed.epoch,
            latest_blockhash: agreed.latest_blockhash.clone(),
            connected_nodes,
            hd_root_pubkeys: agreed.hd_root_pubkeys.clone(),
        });
        self.state = ClientState::Ready;
        tracing::debug!(
            network = self.config.network.name,
            nodes = self.snapshot.as_ref().map(|s| s.connected_nodes.len()),
            "connected"
        );
        Ok(())
    }

    /// Drop the connection snapshot and return to `Unconnected`.
    pub fn disconnect(&mut self) {
        self.state = ClientState::Unconnected;
        self.snapshot = None;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use blsttc::SecretKeySet;
    use serde_json::json;

    use super::*;
    use crate::config::{LitNetwork, LitNodeClientConfig};
    use crate::network::transport::testing::FakeTransport;

    /// Keys for a simulated network of share-holding nodes.
    pub(crate) struct TestNetwork {
        pub(crate) secret_set: SecretKeySet,
        pub(crate) urls: Vec<String>,
    }

    impl TestNetwork {
        pub(crate) fn new(node_count: usize, threshold: usize) -> Self {
            Self {
                secret_set: SecretKeySet::random(threshold, &mut rand::thread_rng()),
                urls: (0..node_count)
                    .map(|i| format!("https://node-{i}:7470"))
                    .collect(),
            }
        }

        pub(crate) fn subnet_pub_key_hex(&self) -> String {
            hex::encode(self.secret_set.public_keys().public_key().to_bytes())
        }

        pub(crate) fn pub_key_set_hex(&self) -> String {
            hex::encode(self.secret_set.public_keys().to_bytes())
        }

        /// Index of the node a request URL addresses.
        pub(crate) fn node_index(url: &str) -> u64 {
            url.split("node-")
                .nth(1)
                .and_then(|rest| rest.split(':').next())
                .and_then(|digits| digits.parse().ok())
                .expect("test URLs carry a node index")
        }
    }

    /// A ready client over a fake transport and the given node URLs.
    pub(crate) fn ready_client(
        transport: FakeTransport,
        network: &TestNetwork,
        min_node_count: usize,
    ) -> LitNodeClient {
        let mut config = LitNodeClientConfig::new(LitNetwork {
            name: "test",
            bootstrap_urls: network.urls.clone(),
            min_node_count,
        })
        .with_retry_tolerance(0);
        config.relay_url = None;
        let mut client =
            LitNodeClient::with_parts(config, Arc::new(transport), Arc::new(MemoryStorage::new()));
        client.state = ClientState::Ready;
        client.snapshot = Some(ConnectionSnapshot {
            subnet_pub_key: network.subnet_pub_key_hex(),
            network_pub_key_set: network.pub_key_set_hex(),
            min_node_count,
            current_epoch_number: 3,
            latest_blockhash: format!("0x{}", "12".repeat(32)),
            connected_nodes: network.urls.clone(),
            hd_root_pubkeys: vec![],
        });
        client
    }

    /// A handshake payload all fake nodes agree on.
    pub(crate) fn handshake_json(network: &TestNetwork) -> serde_json::Value {
        json!({
            "subnetPubKey": network.subnet_pub_key_hex(),
            "networkPubKeySet": network.pub_key_set_hex(),
            "latestBlockhash": format!("0x{}", "12".repeat(32)),
            "epoch": 3,
            "minNodeCount": 2,
            "hdRootPubkeys": [],
        })
    }
}
