// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity-bound encryption and threshold decryption.
//!
//! A ciphertext is bound to an identity parameter derived from the
//! access-control conditions and the plaintext digest:
//!
//! ```text
//! lit-accesscontrolcondition://<sha256(conditions)>/<sha256(plaintext)>
//! ```
//!
//! Both halves are lowercase hex, and the string must match
//! byte-for-byte between encryptor and decryptor, so the same conditions
//! can never release a different payload. Encryption is local (it only
//! needs the subnet public key); decryption collects per-node shares
//! conditional on the access-control predicate.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::crypto::{self, bls};
use crate::error::{Error, Result};
use crate::models::{
    AuthSig, BlsSignatureShare, EncryptResponse, SessionSigsMap, RESOURCE_PREFIX_ACC,
};
use crate::network::session_sig_for_url;

use super::LitNodeClient;

/// Exactly one of these condition sets must be supplied per call.
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    /// Plain access-control conditions.
    pub access_control_conditions: Option<serde_json::Value>,
    /// EVM contract-call conditions.
    pub evm_contract_conditions: Option<serde_json::Value>,
    /// Solana RPC conditions.
    pub sol_rpc_conditions: Option<serde_json::Value>,
    /// Mixed-chain unified conditions.
    pub unified_access_control_conditions: Option<serde_json::Value>,
}

impl ConditionSet {
    /// The single populated variant as `(wire field name, value)`.
    pub(crate) fn exactly_one(&self) -> Result<(&'static str, &serde_json::Value)> {
        let populated: Vec<(&'static str, &serde_json::Value)> = [
            (
                "accessControlConditions",
                self.access_control_conditions.as_ref(),
            ),
            ("evmContractConditions", self.evm_contract_conditions.as_ref()),
            ("solRpcConditions", self.sol_rpc_conditions.as_ref()),
            (
                "unifiedAccessControlConditions",
                self.unified_access_control_conditions.as_ref(),
            ),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect();

        match populated.as_slice() {
            [] => Err(Error::params_missing(
                "exactly one access-control condition set is required",
            )),
            [single] => Ok(*single),
            _ => Err(Error::invalid_argument(
                "condition set variants are mutually exclusive",
            )),
        }
    }
}

/// Parameters for [`LitNodeClient::encrypt`].
#[derive(Debug, Clone, Default)]
pub struct EncryptParams {
    /// The plaintext to protect.
    pub data_to_encrypt: Vec<u8>,
    /// The predicate gating decryption.
    pub conditions: ConditionSet,
}

/// Parameters for [`LitNodeClient::decrypt`].
#[derive(Debug, Clone, Default)]
pub struct DecryptParams {
    /// The ciphertext, base64.
    pub ciphertext: String,
    /// SHA-256 of the original plaintext, lowercase hex.
    pub data_to_encrypt_hash: String,
    /// The predicate the ciphertext was bound to. Must hash identically
    /// to the set used at encryption time.
    pub conditions: ConditionSet,
    /// Chain the conditions evaluate against.
    pub chain: String,
    /// Per-node session signatures authorizing the call.
    pub session_sigs: Option<SessionSigsMap>,
    /// Single wallet signature used for every node when no session sigs
    /// are supplied.
    pub auth_sig: Option<AuthSig>,
}

/// Canonical lowercase-hex hash of a condition set.
pub(crate) fn hash_conditions(conditions: &serde_json::Value) -> Result<String> {
    let canonical = serde_json::to_string(conditions)
        .map_err(|e| Error::invalid_param_type(format!("unserializable conditions: {e}")))?;
    Ok(crypto::sha256_hex(canonical.as_bytes()))
}

/// The identity parameter binding a condition hash to a payload digest.
pub(crate) fn identity_param(conditions_hash: &str, data_hash: &str) -> String {
    format!("{RESOURCE_PREFIX_ACC}://{conditions_hash}/{data_hash}")
}

impl LitNodeClient {
    /// Encrypt data to the network, gated by an access-control
    /// predicate.
    pub fn encrypt(&self, params: EncryptParams) -> Result<EncryptResponse> {
        let snapshot = self.ready()?;
        if params.data_to_encrypt.is_empty() {
            return Err(Error::params_missing("dataToEncrypt must not be empty"));
        }
        let (_, conditions) = params.conditions.exactly_one()?;

        let conditions_hash = hash_conditions(conditions)?;
        let data_hash = crypto::sha256_hex(&params.data_to_encrypt);
        let identity = identity_param(&conditions_hash, &data_hash);

        let subnet_key = bls::public_key_from_hex(&snapshot.subnet_pub_key)?;
        let ciphertext = bls::encrypt(&subnet_key, &params.data_to_encrypt, identity.as_bytes());

        Ok(EncryptResponse {
            ciphertext: STANDARD.encode(ciphertext),
            data_to_encrypt_hash: data_hash,
        })
    }

    /// Collect decryption shares from the network and release the
    /// plaintext.
    pub async fn decrypt(&self, params: DecryptParams) -> Result<Vec<u8>> {
        let snapshot = self.ready()?;
        if params.ciphertext.is_empty() {
            return Err(Error::params_missing("ciphertext is required"));
        }
        if params.data_to_encrypt_hash.is_empty() {
            return Err(Error::params_missing("dataToEncryptHash is required"));
        }
        let (condition_field, conditions) = params.conditions.exactly_one()?;

        let conditions_hash = hash_conditions(conditions)?;
        let identity = identity_param(&conditions_hash, &params.data_to_encrypt_hash);
        let ciphertext = STANDARD
            .decode(&params.ciphertext)
            .map_err(|e| Error::invalid_param_type(format!("invalid ciphertext base64: {e}")))?;

        let urls = snapshot.connected_nodes.clone();
        let min_count = snapshot.min_node_count.min(urls.len());
        let epoch = snapshot.current_epoch_number;

        let batch = self
            .dispatcher
            .dispatch(&urls, "/web/encryption/sign", min_count, |url| {
                // Each node demands its own authorization.
                let auth_sig = match &params.session_sigs {
                    Some(session_sigs) => session_sig_for_url(session_sigs, url)?.clone(),
                    None => params.auth_sig.clone().ok_or_else(|| {
                        Error::invalid_argument(
                            "either sessionSigs or an authSig is required for decryption",
                        )
                    })?,
                };
                Ok(serde_json::json!({
                    condition_field: conditions,
                    "ciphertext": params.ciphertext,
                    "dataToEncryptHash": params.data_to_encrypt_hash,
                    "chain": params.chain,
                    "authSig": auth_sig,
                    "epoch": epoch,
                }))
            })
            .await?;
        let request_id = batch.request_id.clone();

        let mut shares: Vec<BlsSignatureShare> = Vec::new();
        for response in &batch.responses {
            match serde_json::from_value::<BlsSignatureShare>(response.value.clone()) {
                Ok(share) => shares.push(share),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "malformed decryption share");
                }
            }
        }
        if shares.len() < min_count {
            return Err(Error::unknown(format!(
                "not enough decryption shares: {} < {min_count}",
                shares.len()
            ))
            .with_request_id(request_id));
        }
        shares.sort_by_key(|share| share.share_index);

        let mut pairs = Vec::new();
        for share in &shares {
            match bls::decryption_share_from_hex(&share.signature_share) {
                Ok(parsed) => pairs.push((share.share_index, parsed)),
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable decryption share; dropping");
                }
            }
        }

        let public_key_set = bls::public_key_set_from_hex(&snapshot.network_pub_key_set)?;
        bls::verify_and_decrypt_with_shares(
            &public_key_set,
            identity.as_bytes(),
            &ciphertext,
            &pairs,
        )
        .map_err(|e| e.with_request_id(request_id))
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

    fn allow_all_conditions() -> ConditionSet {
        ConditionSet {
            access_control_conditions: Some(json!([{
                "contractAddress": "",
                "standardContractType": "",
                "chain": "ethereum",
                "method": "eth_getBalance",
                "parameters": [":userAddress", "latest"],
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

    #[test]
    fn identity_parameter_is_deterministic_and_distinct() {
        let conditions = allow_all_conditions();
        let hash = hash_conditions(conditions.access_control_conditions.as_ref().unwrap()).unwrap();
        let a = identity_param(&hash, &crypto::sha256_hex(b"secret"));
        let b = identity_param(&hash, &crypto::sha256_hex(b"secret"));
        assert_eq!(a, b);
        assert!(a.starts_with("lit-accesscontrolcondition://"));

        let different_data = identity_param(&hash, &crypto::sha256_hex(b"other"));
        assert_ne!(a, different_data);

        let other_hash = hash_conditions(&json!([{"chain": "polygon"}])).unwrap();
        assert_ne!(
            identity_param(&other_hash, &crypto::sha256_hex(b"secret")),
            a
        );
    }

    #[test]
    fn condition_set_must_have_exactly_one_variant() {
        let none = ConditionSet::default();
        assert_eq!(
            none.exactly_one().unwrap_err().kind,
            ErrorKind::ParamsMissing
        );

        let mut two = allow_all_conditions();
        two.sol_rpc_conditions = Some(json!([]));
        assert_eq!(
            two.exactly_one().unwrap_err().kind,
            ErrorKind::InvalidArgument
        );
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_round_trips() {
        let network = TestNetwork::new(3, 1);
        let secret_set = network.secret_set.clone();
        // Nodes produce decryption shares for the submitted ciphertext.
        let transport = FakeTransport::new(move |url, body| {
            assert!(body["authSig"].is_object());
            assert_eq!(body["chain"], "ethereum");
            let ciphertext_b64 = body["ciphertext"].as_str().unwrap();
            let ciphertext =
                blsttc::Ciphertext::from_bytes(&STANDARD.decode(ciphertext_b64).unwrap()).unwrap();
            let index = TestNetwork::node_index(url);
            let share = secret_set
                .secret_key_share(index)
                .decrypt_share(&ciphertext)
                .expect("valid ciphertext");
            Ok(json!({
                "signatureShare": hex::encode(share.to_bytes()),
                "shareIndex": index,
                "curveType": "BLS",
            }))
        });
        let client = ready_client(transport, &network, 2);

        let encrypted = client
            .encrypt(EncryptParams {
                data_to_encrypt: b"secret".to_vec(),
                conditions: allow_all_conditions(),
            })
            .unwrap();
        assert_eq!(encrypted.data_to_encrypt_hash, crypto::sha256_hex(b"secret"));

        let decrypted = client
            .decrypt(DecryptParams {
                ciphertext: encrypted.ciphertext.clone(),
                data_to_encrypt_hash: encrypted.data_to_encrypt_hash.clone(),
                conditions: allow_all_conditions(),
                chain: "ethereum".into(),
                session_sigs: None,
                auth_sig: Some(caller_auth_sig()),
            })
            .await
            .unwrap();
        assert_eq!(decrypted, b"secret");

        // A mutated condition set derives a different identity and the
        // envelope check rejects it.
        let mut mutated = allow_all_conditions();
        mutated.access_control_conditions = Some(json!([{"chain": "polygon"}]));
        let err = client
            .decrypt(DecryptParams {
                ciphertext: encrypted.ciphertext,
                data_to_encrypt_hash: encrypted.data_to_encrypt_hash,
                conditions: mutated,
                chain: "ethereum".into(),
                session_sigs: None,
                auth_sig: Some(caller_auth_sig()),
            })
            .await
            .unwrap_err();
        assert!(err.message.contains("identity parameter"));
        assert!(err.request_id.is_some());
    }

    #[tokio::test]
    async fn decryption_demands_per_node_authorization() {
        let network = TestNetwork::new(2, 1);
        let transport = FakeTransport::new(|_url, _body| {
            panic!("transport must not be reached");
        });
        let client = ready_client(transport, &network, 2);

        let err = client
            .decrypt(DecryptParams {
                ciphertext: STANDARD.encode(b"ct"),
                data_to_encrypt_hash: "ab".repeat(32),
                conditions: allow_all_conditions(),
                chain: "ethereum".into(),
                session_sigs: None,
                auth_sig: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
