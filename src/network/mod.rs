// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Node Dispatch
//!
//! Fan-out of one request to many nodes, quorum collection, and
//! retry-with-tolerance.
//!
//! ## Batch semantics
//!
//! A batch succeeds once at least `min_count` nodes respond successfully;
//! it fails when so many nodes have errored that the quorum can no longer
//! be reached. Failed batches are retried whole, up to the configured
//! tolerance, with non-final failures logged. One request id is generated
//! per batch and propagated to every node and into every error.

pub mod targeted;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{Error, NodeDiagnostic, Result};
use crate::models::{AuthSig, SessionSigsMap};

pub use transport::{HttpTransport, Transport};

/// A successful response from one node.
#[derive(Debug, Clone)]
pub struct NodeResponse {
    /// The node that answered.
    pub url: String,
    /// The node's JSON payload.
    pub value: serde_json::Value,
}

/// A successful batch: the quorum's responses plus the batch request id.
#[derive(Debug, Clone)]
pub struct BatchSuccess {
    /// Request id propagated to every node of the batch.
    pub request_id: String,
    /// Successful responses, in node-list order.
    pub responses: Vec<NodeResponse>,
}

/// Look up the session signature minted for `url`.
///
/// Every outbound node request must carry the signature addressed to
/// that exact node.
pub fn session_sig_for_url<'a>(
    session_sigs: &'a SessionSigsMap,
    url: &str,
) -> Result<&'a AuthSig> {
    session_sigs.get(url).ok_or_else(|| {
        Error::wallet_signature_not_found(format!("no session signature for node {url}"))
    })
}

/// Fans requests out to nodes and collects quorums.
#[derive(Clone)]
pub struct NodeDispatcher {
    transport: Arc<dyn Transport>,
    retry_tolerance: u32,
    node_timeout: Duration,
}

impl NodeDispatcher {
    /// Create a dispatcher over `transport`.
    pub fn new(transport: Arc<dyn Transport>, retry_tolerance: u32, node_timeout: Duration) -> Self {
        Self {
            transport,
            retry_tolerance,
            node_timeout,
        }
    }

    /// Send one request per node URL to `path` and wait for a quorum of
    /// `min_count` successes.
    ///
    /// `build_body` receives the node's base URL (the key session
    /// signatures are minted under) and constructs the per-node request
    /// body; its failures (e.g. a missing per-node session signature)
    /// surface synchronously, before any I/O. Node-side failures are
    /// aggregated and surfaced only after the retry budget is exhausted.
    pub async fn dispatch<F>(
        &self,
        urls: &[String],
        path: &str,
        min_count: usize,
        build_body: F,
    ) -> Result<BatchSuccess>
    where
        F: Fn(&str) -> Result<serde_json::Value>,
    {
        if urls.is_empty() {
            return Err(Error::invalid_argument("no node URLs to dispatch to"));
        }
        if min_count == 0 || min_count > urls.len() {
            return Err(Error::invalid_argument(format!(
                "quorum size {min_count} out of range for {} nodes",
                urls.len()
            )));
        }

        // Build every body first so shape errors surface before I/O.
        let bodies: Vec<serde_json::Value> = urls
            .iter()
            .map(|url| build_body(url))
            .collect::<Result<_>>()?;

        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let mut diagnostics = Vec::new();

        for attempt in 0..=self.retry_tolerance {
            let batch = urls.iter().zip(bodies.iter()).map(|(url, body)| {
                let transport = self.transport.clone();
                let request_id = request_id.clone();
                let endpoint = format!("{}{}", url.trim_end_matches('/'), path);
                async move {
                    let outcome = tokio::time::timeout(
                        self.node_timeout,
                        transport.post(&endpoint, body.clone(), &request_id),
                    )
                    .await;
                    match outcome {
                        Err(_) => Err(NodeDiagnostic {
                            url: url.clone(),
                            message: format!("timed out after {:?}", self.node_timeout),
                        }),
                        Ok(Err(e)) => Err(NodeDiagnostic {
                            url: url.clone(),
                            message: e.message,
                        }),
                        Ok(Ok(value)) => match node_reported_error(&value) {
                            Some(message) => Err(NodeDiagnostic {
                                url: url.clone(),
                                message,
                            }),
                            None => Ok(NodeResponse {
                                url: url.clone(),
                                value,
                            }),
                        },
                    }
                }
            });

            let mut responses = Vec::new();
            diagnostics.clear();
            for result in join_all(batch).await {
                match result {
                    Ok(response) => responses.push(response),
                    Err(diagnostic) => diagnostics.push(diagnostic),
                }
            }

            if responses.len() >= min_count {
                if !diagnostics.is_empty() {
                    tracing::debug!(
                        request_id = %request_id,
                        failed = diagnostics.len(),
                        "quorum reached despite node failures"
                    );
                }
                return Ok(BatchSuccess {
                    request_id,
                    responses,
                });
            }

            if attempt < self.retry_tolerance {
                tracing::warn!(
                    request_id = %request_id,
                    attempt = attempt + 1,
                    succeeded = responses.len(),
                    required = min_count,
                    "quorum not reached; retrying batch"
                );
            }
        }

        tracing::error!(
            request_id = %request_id,
            failed = diagnostics.len(),
            "batch failed after exhausting retries"
        );
        Err(Error::node_request(
            format!(
                "quorum of {min_count} not reached across {} nodes after {} attempt(s)",
                urls.len(),
                self.retry_tolerance + 1
            ),
            diagnostics,
        )
        .with_request_id(request_id))
    }
}

/// Extract a node-reported application error from an otherwise
/// successful HTTP response.
fn node_reported_error(value: &serde_json::Value) -> Option<String> {
    if value.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
        let message = value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("node reported failure");
        return Some(message.to_string());
    }
    None
}
