// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Threshold-ECDSA signing under a PKP.
//!
//! Every node contributes one additive fragment; the network requires a
//! response from all nodes but only the minimum node count of agreeing
//! fragments to combine.

use k256::ecdsa::VerifyingKey;

use crate::crypto::ecdsa;
use crate::error::{Error, Result};
use crate::models::{AuthMethod, EcdsaSignedData, PkpSignature, SessionSigsMap};
use crate::network::session_sig_for_url;

use super::LitNodeClient;

/// The Ethereum account controlled by a PKP, from its SEC1 public key
/// hex.
pub(crate) fn pkp_eth_address(pub_key: &str) -> Result<String> {
    let bytes = hex::decode(pub_key.trim_start_matches("0x"))
        .map_err(|e| Error::invalid_param_type(format!("invalid PKP public key hex: {e}")))?;
    let verifying_key = VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|e| Error::invalid_param_type(format!("invalid PKP public key: {e}")))?;
    Ok(crate::auth::siwe::address_of(&verifying_key))
}

/// Parameters for [`LitNodeClient::pkp_sign`].
#[derive(Debug, Clone, Default)]
pub struct PkpSignParams {
    /// The 32-byte digest to sign.
    pub to_sign: Vec<u8>,
    /// SEC1 public key of the PKP, hex (with or without `0x`).
    pub pub_key: String,
    /// Per-node session signatures authorizing the call.
    pub session_sigs: Option<SessionSigsMap>,
    /// Auth methods presented instead of (or alongside) session sigs.
    pub auth_methods: Vec<AuthMethod>,
}

impl LitNodeClient {
    /// Request a threshold ECDSA signature over a digest.
    pub async fn pkp_sign(&self, params: PkpSignParams) -> Result<PkpSignature> {
        let snapshot = self.ready()?;
        if params.to_sign.is_empty() {
            return Err(Error::invalid_param_type("toSign must not be empty"));
        }
        if params.pub_key.is_empty() {
            return Err(Error::params_missing("pubKey is required"));
        }
        if params.session_sigs.is_none() && params.auth_methods.is_empty() {
            return Err(Error::params_missing(
                "either sessionSigs or at least one authMethod is required",
            ));
        }

        let pub_key = format!("0x{}", params.pub_key.trim_start_matches("0x"));
        let urls = snapshot.connected_nodes.clone();
        let epoch = snapshot.current_epoch_number;
        let min_node_count = snapshot.min_node_count;

        // Signing needs a fragment from every node; only combination
        // tolerates disagreement.
        let batch = self
            .dispatcher
            .dispatch(&urls, "/web/pkp/sign", urls.len(), |url| {
                let mut body = serde_json::json!({
                    "toSign": params.to_sign,
                    "pubKey": pub_key,
                    "epoch": epoch,
                });
                if let Some(session_sigs) = &params.session_sigs {
                    body["authSig"] = serde_json::to_value(session_sig_for_url(session_sigs, url)?)
                        .expect("auth sig always serializes");
                }
                if !params.auth_methods.is_empty() {
                    body["authMethods"] = serde_json::to_value(&params.auth_methods)
                        .expect("auth methods always serialize");
                }
                Ok(body)
            })
            .await?;
        let request_id = batch.request_id.clone();

        let mut shares = Vec::new();
        for response in &batch.responses {
            let payload = response
                .value
                .get("signedData")
                .unwrap_or(&response.value)
                .clone();
            match serde_json::from_value::<EcdsaSignedData>(payload) {
                Ok(share) => shares.push(share),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "malformed signature share");
                }
            }
        }

        ecdsa::combine_ecdsa_shares(&shares, min_node_count)
            .map_err(|e| e.with_request_id(request_id))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::testing::{ready_client, TestNetwork};
    use super::*;
    use crate::error::ErrorKind;
    use crate::network::transport::testing::FakeTransport;

    fn params_with_auth_method() -> PkpSignParams {
        PkpSignParams {
            to_sign: vec![7u8; 32],
            pub_key: format!("04{}", "ab".repeat(64)),
            session_sigs: None,
            auth_methods: vec![AuthMethod {
                auth_method_type: crate::models::auth_method::ETH_WALLET,
                access_token: "token".into(),
            }],
        }
    }

    #[tokio::test]
    async fn parameter_shape_is_validated_before_dispatch() {
        let network = TestNetwork::new(2, 1);
        let transport = FakeTransport::new(|_url, _body| {
            panic!("transport must not be reached");
        });
        let client = ready_client(transport, &network, 2);

        let mut empty_digest = params_with_auth_method();
        empty_digest.to_sign.clear();
        assert_eq!(
            client.pkp_sign(empty_digest).await.unwrap_err().kind,
            ErrorKind::InvalidParamType
        );

        let mut no_auth = params_with_auth_method();
        no_auth.auth_methods.clear();
        assert_eq!(
            client.pkp_sign(no_auth).await.unwrap_err().kind,
            ErrorKind::ParamsMissing
        );

        let mut no_key = params_with_auth_method();
        no_key.pub_key = String::new();
        assert_eq!(
            client.pkp_sign(no_key).await.unwrap_err().kind,
            ErrorKind::ParamsMissing
        );
    }

    #[tokio::test]
    async fn missing_per_node_session_sig_fails_before_io() {
        let network = TestNetwork::new(2, 1);
        let transport = FakeTransport::new(|_url, _body| {
            panic!("transport must not be reached");
        });
        let client = ready_client(transport, &network, 2);

        let mut params = params_with_auth_method();
        params.auth_methods.clear();
        params.session_sigs = Some(SessionSigsMap::new());
        assert_eq!(
            client.pkp_sign(params).await.unwrap_err().kind,
            ErrorKind::WalletSignatureNotFound
        );
    }

    #[tokio::test]
    async fn signing_requires_every_node_to_answer() {
        let network = TestNetwork::new(3, 1);
        let transport = FakeTransport::new(|url, _body| {
            if url.contains("node-2") {
                Err(crate::error::Error::unknown("down"))
            } else {
                Ok(json!({"signedData": {}}))
            }
        });
        let client = ready_client(transport, &network, 2);

        let err = client
            .pkp_sign(params_with_auth_method())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NodeRequest);
    }

    #[test]
    fn eth_address_derivation_matches_the_signer() {
        use k256::ecdsa::SigningKey;
        use k256::elliptic_curve::sec1::ToEncodedPoint;

        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let pub_key_hex = hex::encode(
            signing_key
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes(),
        );
        let derived = pkp_eth_address(&pub_key_hex).unwrap();
        assert_eq!(
            derived,
            crate::auth::siwe::address_of(signing_key.verifying_key())
        );
        assert!(pkp_eth_address("zz").is_err());
    }
}
