// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Action execution.
//!
//! Submits user code (or a published action id) plus parameters to the
//! network, reconciles the per-node results, and combines any signature
//! or claim fragments the action produced.
//!
//! ## Response reconciliation
//!
//! Nodes execute independently, so their responses can differ. The
//! executor takes the most frequent response value; the configured
//! strategy only breaks ties between equally-frequent values. Signature
//! fragments are combined across all responding nodes regardless of the
//! chosen response, since each node holds a distinct share.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::crypto::{self, ecdsa};
use crate::error::{Error, Result};
use crate::models::{
    ClaimData, ExecuteJsResponse, ExecuteNodeShare, ResponseStrategy, SessionSigsMap,
};
use crate::network::targeted::{action_content_id, select_targeted_nodes};
use crate::network::session_sig_for_url;

use super::LitNodeClient;

/// Parameters for [`LitNodeClient::execute_js`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteJsParams {
    /// Inline action source. Exactly one of this and `ipfs_id` is
    /// required.
    pub code: Option<String>,
    /// Content id of a published action.
    pub ipfs_id: Option<String>,
    /// Parameters exposed to the action as `jsParams`.
    pub js_params: Option<serde_json::Value>,
    /// Per-node session signatures authorizing the call.
    pub session_sigs: SessionSigsMap,
    /// Tie-break strategy for response reconciliation.
    pub response_strategy: ResponseStrategy,
    /// Run on a deterministic subset of this many nodes instead of the
    /// whole network.
    pub target_node_range: Option<usize>,
}

impl LitNodeClient {
    /// Execute an action on the network and aggregate the results.
    pub async fn execute_js(&self, params: ExecuteJsParams) -> Result<ExecuteJsResponse> {
        let snapshot = self.ready()?;

        match (&params.code, &params.ipfs_id) {
            (None, None) => {
                return Err(Error::params_missing("one of code or ipfsId is required"))
            }
            (Some(_), Some(_)) => {
                return Err(Error::invalid_argument("code and ipfsId are mutually exclusive"))
            }
            _ => {}
        }
        if let Some(js_params) = &params.js_params {
            if !js_params.is_object() {
                return Err(Error::invalid_param_type("jsParams must be a JSON object"));
            }
        }
        if params.session_sigs.is_empty() {
            return Err(Error::wallet_signature_not_found(
                "sessionSigs must carry one signature per node",
            ));
        }

        let encoded_code = params.code.as_ref().map(|code| STANDARD.encode(code));

        // Targeted execution runs on a deterministic subset keyed by the
        // action's content id.
        let urls = match params.target_node_range {
            None => snapshot.connected_nodes.clone(),
            Some(target_count) => {
                let content_id = match (&params.ipfs_id, &params.code) {
                    (Some(ipfs_id), _) => ipfs_id.clone(),
                    (None, Some(code)) => action_content_id(code.as_bytes()),
                    (None, None) => unreachable!("validated above"),
                };
                let indices = select_targeted_nodes(
                    &content_id,
                    snapshot.connected_nodes.len(),
                    target_count,
                )?;
                indices
                    .into_iter()
                    .map(|index| snapshot.connected_nodes[index].clone())
                    .collect()
            }
        };
        let min_count = snapshot.min_node_count.min(urls.len());
        let epoch = snapshot.current_epoch_number;
        let min_node_count = snapshot.min_node_count;

        let batch = self
            .dispatcher
            .dispatch(&urls, "/web/execute", min_count, |url| {
                let mut body = serde_json::json!({
                    "authSig": session_sig_for_url(&params.session_sigs, url)?,
                    "epoch": epoch,
                });
                if let Some(code) = &encoded_code {
                    body["code"] = serde_json::json!(code);
                }
                if let Some(ipfs_id) = &params.ipfs_id {
                    body["ipfsId"] = serde_json::json!(ipfs_id);
                }
                if let Some(js_params) = &params.js_params {
                    body["jsParams"] = js_params.clone();
                }
                Ok(body)
            })
            .await?;
        let request_id = batch.request_id.clone();

        let mut shares: Vec<ExecuteNodeShare> = Vec::new();
        for response in &batch.responses {
            match serde_json::from_value::<ExecuteNodeShare>(response.value.clone()) {
                Ok(share) => shares.push(share),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "malformed execute response");
                }
            }
        }
        if shares.is_empty() {
            return Err(Error::unknown("no parseable node responses")
                .with_request_id(request_id));
        }

        let chosen = select_response(&shares, &params.response_strategy);
        let response_value = parse_response(&chosen.response);
        let logs = crypto::most_common(shares.iter().map(|s| s.logs.clone()), |logs| logs.clone())
            .map(|winner| winner.value)
            .unwrap_or_default();

        // No signing or claiming: the reconciled response is the result.
        if chosen.signed_data.is_empty() && chosen.claim_data.is_empty() {
            return Ok(ExecuteJsResponse {
                success: true,
                response: response_value,
                logs,
                signatures: Default::default(),
                claims: Default::default(),
            });
        }

        // Combine signature fragments per signature name, across all
        // nodes.
        let mut signatures = std::collections::BTreeMap::new();
        let sig_names: std::collections::BTreeSet<String> = shares
            .iter()
            .flat_map(|share| share.signed_data.keys().cloned())
            .collect();
        for name in sig_names {
            let fragments: Vec<_> = shares
                .iter()
                .filter_map(|share| share.signed_data.get(&name).cloned())
                .collect();
            let combined = ecdsa::combine_ecdsa_shares(&fragments, min_node_count)
                .map_err(|e| e.with_request_id(request_id.clone()))?;
            signatures.insert(name, combined);
        }

        // Collect claim attestations per claim name.
        let mut claims = std::collections::BTreeMap::new();
        let claim_names: std::collections::BTreeSet<String> = shares
            .iter()
            .flat_map(|share| share.claim_data.keys().cloned())
            .collect();
        for name in claim_names {
            let node_claims: Vec<_> = shares
                .iter()
                .filter_map(|share| share.claim_data.get(&name).cloned())
                .collect();
            let derived_key_id = crypto::most_common(node_claims.clone(), |claim| {
                claim.derived_key_id.clone()
            })
            .map(|winner| {
                if !winner.unanimous {
                    tracing::warn!(claim = %name, "nodes disagree on the derived key id");
                }
                winner.value.derived_key_id
            })
            .unwrap_or_default();
            let fragments = node_claims
                .iter()
                .map(|claim| ecdsa::split_recoverable_signature(&claim.signature))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| e.with_request_id(request_id.clone()))?;
            claims.insert(
                name,
                ClaimData {
                    signatures: fragments,
                    derived_key_id,
                },
            );
        }

        Ok(ExecuteJsResponse {
            success: true,
            response: response_value,
            logs,
            signatures,
            claims,
        })
    }
}

/// Pick the response all further processing keys off: most frequent by
/// equality, strategy-resolved among ties.
fn select_response<'a>(
    shares: &'a [ExecuteNodeShare],
    strategy: &ResponseStrategy,
) -> &'a ExecuteNodeShare {
    let groups = crypto::tally_by_key(shares.iter().collect::<Vec<_>>(), |share| {
        share.response.clone()
    });
    let top_count = groups[0].count();
    let tied: Vec<_> = groups.iter().take_while(|g| g.count() == top_count).collect();

    let index = match strategy {
        ResponseStrategy::LeastCommon => 0,
        ResponseStrategy::MostCommon => tied.len() - 1,
        ResponseStrategy::Custom(picker) => {
            let keys: Vec<String> = tied.iter().map(|g| g.key.clone()).collect();
            picker(&keys).min(tied.len() - 1)
        }
    };
    tied[index].items[0]
}

/// Parse the action's response string as JSON, falling back to the raw
/// string.
fn parse_response(response: &str) -> serde_json::Value {
    serde_json::from_str(response)
        .unwrap_or_else(|_| serde_json::Value::String(response.to_string()))
}
