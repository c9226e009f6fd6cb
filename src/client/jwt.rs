// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Conditional signed JWTs.
//!
//! The network jointly signs a token attesting that the caller satisfied
//! an access-control predicate. Nodes return BLS shares together with
//! the unsigned token body they signed; the client combines the shares
//! over the most common body and appends the signature as the third JWT
//! segment.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

use crate::crypto::{self, bls};
use crate::error::{Error, Result};
use crate::models::{AuthSig, BlsSignatureShare, SessionSigsMap};
use crate::network::session_sig_for_url;

use super::encryption::ConditionSet;
use super::LitNodeClient;

/// Lifetime of an issued token.
const TOKEN_LIFETIME_SECS: i64 = 12 * 60 * 60;

/// Parameters for [`LitNodeClient::get_signed_token`].
#[derive(Debug, Clone, Default)]
pub struct SigningAccessControlParams {
    /// The predicate the caller must satisfy.
    pub conditions: ConditionSet,
    /// Chain the conditions evaluate against.
    pub chain: String,
    /// The protected resource the token attests access to.
    pub resource_id: Option<serde_json::Value>,
    /// Per-node session signatures authorizing the call.
    pub session_sigs: Option<SessionSigsMap>,
    /// Single wallet signature used for every node when no session sigs
    /// are supplied.
    pub auth_sig: Option<AuthSig>,
}

impl LitNodeClient {
    /// Request a network-signed JWT gated by an access-control
    /// predicate.
    pub async fn get_signed_token(&self, params: SigningAccessControlParams) -> Result<String> {
        let snapshot = self.ready()?;
        let (condition_field, conditions) = params.conditions.exactly_one()?;

        let issued_at = Utc::now().timestamp();
        let expiration = issued_at + TOKEN_LIFETIME_SECS;

        let urls = snapshot.connected_nodes.clone();
        let min_count = snapshot.min_node_count.min(urls.len());
        let epoch = snapshot.current_epoch_number;

        let batch = self
            .dispatcher
            .dispatch(
                &urls,
                "/web/signing/access_control_condition",
                min_count,
                |url| {
                    let auth_sig = match &params.session_sigs {
                        Some(session_sigs) => session_sig_for_url(session_sigs, url)?.clone(),
                        None => params.auth_sig.clone().ok_or_else(|| {
                            Error::invalid_argument(
                                "either sessionSigs or an authSig is required for signing",
                            )
                        })?,
                    };
                    let mut body = serde_json::json!({
                        condition_field: conditions,
                        "chain": params.chain,
                        "authSig": auth_sig,
                        "iat": issued_at,
                        "exp": expiration,
                        "epoch": epoch,
                    });
                    if let Some(resource_id) = &params.resource_id {
                        body["resourceId"] = resource_id.clone();
                    }
                    Ok(body)
                },
            )
            .await?;
        let request_id = batch.request_id.clone();

        let mut shares: Vec<BlsSignatureShare> = Vec::new();
        for response in &batch.responses {
            match serde_json::from_value::<BlsSignatureShare>(response.value.clone()) {
                Ok(share) => shares.push(share),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "malformed signing share");
                }
            }
        }
        if shares.len() < min_count {
            return Err(Error::unknown(format!(
                "not enough signing shares: {} < {min_count}",
                shares.len()
            ))
            .with_request_id(request_id));
        }
        shares.sort_by_key(|share| share.share_index);

        // Nodes each report the token body they signed; combine over the
        // most common one.
        let agreed = crypto::most_common(shares.clone(), |share| {
            share.unsigned_jwt.clone().unwrap_or_default()
        })
        .expect("shares is non-empty");
        if !agreed.unanimous {
            tracing::warn!("nodes disagree on the unsigned token; combining the majority");
        }
        let Some(unsigned_jwt) = agreed.value.unsigned_jwt.clone() else {
            return Err(Error::unknown("nodes returned no unsigned token")
                .with_request_id(request_id));
        };

        let public_key_set = bls::public_key_set_from_hex(&snapshot.network_pub_key_set)?;
        let mut pairs = Vec::new();
        for share in shares
            .iter()
            .filter(|s| s.unsigned_jwt.as_deref() == Some(unsigned_jwt.as_str()))
        {
            match bls::signature_share_from_hex(&share.signature_share) {
                Ok(parsed) => pairs.push((share.share_index, parsed)),
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable signing share; dropping");
                }
            }
        }
        let signature = bls::combine_signature_shares(&public_key_set, &pairs)
            .map_err(|e| e.with_request_id(request_id.clone()))?;
        if !public_key_set
            .public_key()
            .verify(&signature, unsigned_jwt.as_bytes())
        {
            return Err(
                Error::unknown("combined token signature failed verification")
                    .with_request_id(request_id),
            );
        }

        Ok(format!(
            "{unsigned_jwt}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::testing::{ready_client, TestNetwork};
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::DERIVED_VIA_SESSION_SIG;
    use crate::network::transport::testing::FakeTransport;

    fn conditions() -> ConditionSet {
        ConditionSet {
            access_control_conditions: Some(json!([{
                "chain": "ethereum",
                "method": "eth_getBalance",
                "returnValueTest": {"comparator": ">=", "value": "0"},
            }])),
            ..Default::default()
        }
    }

    fn caller_auth_sig() -> AuthSig {
        AuthSig {
            sig: "aa".into(),
            derived_via: DERIVED_VIA_SESSION_SIG.into(),
            signed_message: "{}".into(),
            address: "ab".repeat(32),
            algo: Some("ed25519".into()),
        }
    }

    #[tokio::test]
    async fn combines_shares_into_a_three_segment_token() {
        let network = TestNetwork::new(3, 1);
        let secret_set = network.secret_set.clone();
        let unsigned = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"BLS12-381","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(r#"{"iss":"LIT","chain":"ethereum"}"#),
        );
        let unsigned_for_nodes = unsigned.clone();
        let transport = FakeTransport::new(move |url, _body| {
            let index = TestNetwork::node_index(url);
            let share = secret_set
                .secret_key_share(index)
                .sign(unsigned_for_nodes.as_bytes());
            Ok(json!({
                "signatureShare": hex::encode(share.to_bytes()),
                "shareIndex": index,
                "unsignedJwt": unsigned_for_nodes,
                "curveType": "BLS",
            }))
        });
        let client = ready_client(transport, &network, 2);

        let token = client
            .get_signed_token(SigningAccessControlParams {
                conditions: conditions(),
                chain: "ethereum".into(),
                resource_id: Some(json!({"baseUrl": "example.com"})),
                session_sigs: None,
                auth_sig: Some(caller_auth_sig()),
            })
            .await
            .unwrap();

        assert!(token.starts_with(&unsigned));
        assert_eq!(token.split('.').count(), 3);

        // The appended segment is a valid network signature over the
        // unsigned body.
        let sig_b64 = token.rsplit('.').next().unwrap();
        let sig_bytes: [u8; 96] = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .unwrap()
            .try_into()
            .unwrap();
        let signature = blsttc::Signature::from_bytes(sig_bytes).unwrap();
        assert!(network
            .secret_set
            .public_keys()
            .public_key()
            .verify(&signature, unsigned.as_bytes()));
    }

    #[tokio::test]
    async fn requires_some_authorization() {
        let network = TestNetwork::new(2, 1);
        let transport = FakeTransport::new(|_url, _body| {
            panic!("transport must not be reached");
        });
        let client = ready_client(transport, &network, 2);

        let err = client
            .get_signed_token(SigningAccessControlParams {
                conditions: conditions(),
                chain: "ethereum".into(),
                resource_id: None,
                session_sigs: None,
                auth_sig: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
