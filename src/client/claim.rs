// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claiming a derived key from an auth-method proof.
//!
//! The nodes each attest the derived key id with a recoverable ECDSA
//! signature; the attestations, the deterministically-derived public
//! key, and the auth method are handed to a mint callback (caller
//! supplied, or the configured relay) that records the claim on chain.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::crypto::{self, ecdsa, hd_key};
use crate::error::{Error, Result};
use crate::models::{auth_method, AuthMethod, ClaimKeyResponse, ClaimRequest, ClaimShare};

use super::LitNodeClient;

/// Mints a claimed key on chain, returning the transaction id.
pub type MintCallback =
    Arc<dyn Fn(ClaimRequest) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Parameters for [`LitNodeClient::claim_key_id`].
#[derive(Clone)]
pub struct ClaimKeyIdParams {
    /// The auth-method proof the key is derived from.
    pub auth_method: AuthMethod,
    /// Override for the on-chain mint step; the configured relay is used
    /// when absent.
    pub mint_callback: Option<MintCallback>,
}

impl LitNodeClient {
    /// Ask the network to attest a derived key and mint the claim.
    pub async fn claim_key_id(&self, params: ClaimKeyIdParams) -> Result<ClaimKeyResponse> {
        let snapshot = self.ready()?;
        if params.auth_method.auth_method_type == auth_method::WEBAUTHN {
            return Err(Error::invalid_param_type(
                "WebAuthn auth methods cannot be used to claim a key",
            ));
        }
        if params.auth_method.access_token.is_empty() {
            return Err(Error::params_missing("authMethod.accessToken is required"));
        }

        let urls = snapshot.connected_nodes.clone();
        let min_count = snapshot.min_node_count.min(urls.len());
        let body = serde_json::json!({
            "authMethod": params.auth_method,
            "epoch": snapshot.current_epoch_number,
        });

        let batch = self
            .dispatcher
            .dispatch(&urls, "/web/pkp/claim", min_count, |_url| Ok(body.clone()))
            .await?;
        let request_id = batch.request_id.clone();

        let mut shares: Vec<ClaimShare> = Vec::new();
        for response in &batch.responses {
            match serde_json::from_value::<ClaimShare>(response.value.clone()) {
                Ok(share) => shares.push(share),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "malformed claim attestation");
                }
            }
        }
        if shares.len() < min_count {
            return Err(Error::unknown(format!(
                "not enough claim attestations: {} < {min_count}",
                shares.len()
            ))
            .with_request_id(request_id));
        }

        let agreed = crypto::most_common(shares.clone(), |share| share.derived_key_id.clone())
            .expect("shares is non-empty");
        if !agreed.unanimous {
            tracing::warn!("nodes disagree on the derived key id; using the majority");
        }
        let derived_key_id = agreed.value.derived_key_id.clone();

        let signatures = shares
            .iter()
            .filter(|share| share.derived_key_id == derived_key_id)
            .map(|share| ecdsa::split_recoverable_signature(&share.signature))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.with_request_id(request_id.clone()))?;

        let pubkey = hd_key::compute_hd_pub_key(&snapshot.hd_root_pubkeys, &derived_key_id)
            .map_err(|e| e.with_request_id(request_id.clone()))?;

        let claim_request = ClaimRequest {
            derived_key_id: derived_key_id.clone(),
            auth_method_type: params.auth_method.auth_method_type,
            signatures: signatures.clone(),
            pubkey: pubkey.clone(),
            network: self.config.network.name.to_string(),
        };
        let mint_tx = match &params.mint_callback {
            Some(callback) => callback(claim_request).await?,
            None => self.relay_mint(claim_request, &request_id).await?,
        };

        Ok(ClaimKeyResponse {
            signatures,
            derived_key_id,
            pubkey,
            mint_tx,
        })
    }

    /// Default mint path: hand the claim to the configured relay.
    async fn relay_mint(&self, claim_request: ClaimRequest, request_id: &str) -> Result<String> {
        let Some(relay_url) = &self.config.relay_url else {
            return Err(Error::params_missing(
                "no mint callback was provided and no relay URL is configured",
            ));
        };
        let endpoint = format!("{}/auth/claim", relay_url.trim_end_matches('/'));
        let body = serde_json::to_value(&claim_request).expect("claim request always serializes");
        let response = self.transport.post(&endpoint, body, request_id).await?;

        response
            .get("requestId")
            .or_else(|| response.get("txHash"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::unknown("relay returned no transaction id")
                    .with_request_id(request_id.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::testing::{ready_client, TestNetwork};
    use super::*;
    use crate::error::ErrorKind;
    use crate::network::transport::testing::FakeTransport;

    /// Roots plus per-node attestations over one derived key id.
    fn claim_fixture() -> (Vec<String>, String, Vec<serde_json::Value>) {
        use k256::ecdsa::SigningKey;
        use k256::elliptic_curve::sec1::ToEncodedPoint;

        let roots: Vec<String> = (0..2)
            .map(|_| {
                let key = SigningKey::random(&mut rand::thread_rng());
                hex::encode(key.verifying_key().to_encoded_point(true).as_bytes())
            })
            .collect();
        let derived_key_id = "1a2b3c4d".to_string();

        let attestations = (0..3)
            .map(|i| {
                let key = SigningKey::random(&mut rand::thread_rng());
                let digest = crate::crypto::sha256(derived_key_id.as_bytes());
                let (sig, recid) = key.sign_prehash_recoverable(&digest).unwrap();
                let mut bytes = sig.to_bytes().to_vec();
                bytes.push(recid.to_byte());
                json!({
                    "signature": hex::encode(bytes),
                    "derivedKeyId": derived_key_id,
                    "shareIndex": i,
                })
            })
            .collect();
        (roots, derived_key_id, attestations)
    }

    fn eth_auth_method() -> AuthMethod {
        AuthMethod {
            auth_method_type: auth_method::ETH_WALLET,
            access_token: "{\"sig\":\"..\"}".into(),
        }
    }

    #[tokio::test]
    async fn claims_combine_attestations_and_mint_through_the_callback() {
        let (roots, derived_key_id, attestations) = claim_fixture();
        let network = TestNetwork::new(3, 1);
        let transport = FakeTransport::new(move |url, _body| {
            let index = TestNetwork::node_index(url) as usize;
            Ok(attestations[index].clone())
        });
        let mut client = ready_client(transport, &network, 2);
        if let Some(snapshot) = client.snapshot.as_mut() {
            snapshot.hd_root_pubkeys = roots.clone();
        }

        let minted = Arc::new(std::sync::Mutex::new(None::<ClaimRequest>));
        let minted_in_cb = minted.clone();
        let callback: MintCallback = Arc::new(move |request| {
            *minted_in_cb.lock().unwrap() = Some(request);
            Box::pin(async { Ok("0xminttx".to_string()) })
        });

        let response = client
            .claim_key_id(ClaimKeyIdParams {
                auth_method: eth_auth_method(),
                mint_callback: Some(callback),
            })
            .await
            .unwrap();

        assert_eq!(response.derived_key_id, derived_key_id);
        assert_eq!(response.mint_tx, "0xminttx");
        assert_eq!(response.signatures.len(), 3);
        assert!(response.signatures.iter().all(|f| f.v == 27 || f.v == 28));
        assert_eq!(
            response.pubkey,
            hd_key::compute_hd_pub_key(&roots, &derived_key_id).unwrap()
        );

        let forwarded = minted.lock().unwrap().clone().unwrap();
        assert_eq!(forwarded.auth_method_type, auth_method::ETH_WALLET);
        assert_eq!(forwarded.pubkey, response.pubkey);
        assert_eq!(forwarded.network, "test");
    }

    #[tokio::test]
    async fn webauthn_claims_are_rejected() {
        let network = TestNetwork::new(2, 1);
        let transport = FakeTransport::new(|_url, _body| {
            panic!("transport must not be reached");
        });
        let client = ready_client(transport, &network, 2);

        let err = client
            .claim_key_id(ClaimKeyIdParams {
                auth_method: AuthMethod {
                    auth_method_type: auth_method::WEBAUTHN,
                    access_token: "token".into(),
                },
                mint_callback: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParamType);
    }

    #[tokio::test]
    async fn missing_mint_path_is_params_missing() {
        let (roots, _, attestations) = claim_fixture();
        let network = TestNetwork::new(3, 1);
        let transport = FakeTransport::new(move |url, _body| {
            let index = TestNetwork::node_index(url) as usize;
            Ok(attestations[index].clone())
        });
        let mut client = ready_client(transport, &network, 2);
        if let Some(snapshot) = client.snapshot.as_mut() {
            snapshot.hd_root_pubkeys = roots;
        }
        // No callback and no relay configured.
        let err = client
            .claim_key_id(ClaimKeyIdParams {
                auth_method: eth_auth_method(),
                mint_callback: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParamsMissing);
    }
}
