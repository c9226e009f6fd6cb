// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session signature orchestration.
//!
//! Builds the per-node session signatures every operation carries:
//! obtain (or reuse) the session key, anchor it to a wallet signature
//! over the capability delegation, then sign one template per connected
//! node with the session secret key.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};

use crate::auth::capabilities::CapabilityObject;
use crate::auth::{session_key, wallet_sig, AuthNeededCallback};
use crate::crypto::{self, bls};
use crate::error::{Error, Result};
use crate::models::{
    AuthCallbackParams, AuthMethod, AuthSig, BlsSignatureShare, ResourceAbilityRequest,
    SessionKeyPair, SessionSigningTemplate, SessionSigsMap, DERIVED_VIA_NETWORK_SIG,
    DERIVED_VIA_SESSION_SIG,
};

use super::pkp::pkp_eth_address;
use super::LitNodeClient;

/// Default lifetime of the wallet delegation.
fn delegation_lifetime() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// Default lifetime of each minted session signature.
fn session_sig_lifetime() -> ChronoDuration {
    ChronoDuration::minutes(5)
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn iso_now_plus(lifetime: ChronoDuration) -> String {
    (Utc::now() + lifetime).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parameters for [`LitNodeClient::get_session_sigs`].
#[derive(Clone, Default)]
pub struct GetSessionSigsParams {
    /// Chain name for the delegation.
    pub chain: String,
    /// The capabilities the session will exercise.
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
    /// Delegation (and session signature) expiration override, ISO-8601.
    pub expiration: Option<String>,
    /// Caller-built capability object; generated from the requests when
    /// absent.
    pub session_capability_object: Option<CapabilityObject>,
    /// Extra capability signatures to prepend to the chain.
    pub capability_auth_sigs: Vec<AuthSig>,
    /// Capacity delegation to splice into the chain.
    pub capacity_delegation_auth_sig: Option<AuthSig>,
    /// Wallet signature provider for this call.
    pub auth_needed_callback: Option<AuthNeededCallback>,
    /// SIWE domain override.
    pub domain: Option<String>,
    /// Ask the wallet to switch chains before signing.
    pub switch_chain: Option<bool>,
    /// Inline action source for action-bound delegations.
    pub lit_action_code: Option<String>,
    /// Published action id for action-bound delegations.
    pub lit_action_ipfs_id: Option<String>,
    /// Parameters for the bound action.
    pub js_params: Option<serde_json::Value>,
}

impl GetSessionSigsParams {
    /// Parameters demanding `requests` on `chain`, everything else
    /// defaulted.
    pub fn new(chain: impl Into<String>, requests: Vec<ResourceAbilityRequest>) -> Self {
        Self {
            chain: chain.into(),
            resource_ability_requests: requests,
            ..Self::default()
        }
    }
}

/// Parameters for [`LitNodeClient::get_pkp_session_sigs`].
#[derive(Clone)]
pub struct GetPkpSessionSigsParams {
    /// The PKP whose auth methods anchor the session.
    pub pkp_public_key: String,
    /// Authentication proofs presented to the network.
    pub auth_methods: Vec<AuthMethod>,
    /// Chain name for the delegation.
    pub chain: String,
    /// The capabilities the session will exercise.
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
    /// Delegation (and session signature) expiration override, ISO-8601.
    pub expiration: Option<String>,
    /// Extra capability signatures to prepend to the chain.
    pub capability_auth_sigs: Vec<AuthSig>,
    /// Capacity delegation to splice into the chain.
    pub capacity_delegation_auth_sig: Option<AuthSig>,
    /// SIWE domain override.
    pub domain: Option<String>,
}

/// Parameters for [`LitNodeClient::get_lit_action_session_sigs`].
#[derive(Clone)]
pub struct GetLitActionSessionSigsParams {
    /// The PKP-rooted parameters.
    pub pkp: GetPkpSessionSigsParams,
    /// Inline action source. Exactly one of this and
    /// `lit_action_ipfs_id` is required.
    pub lit_action_code: Option<String>,
    /// Published action id.
    pub lit_action_ipfs_id: Option<String>,
    /// Parameters for the action. Required.
    pub js_params: Option<serde_json::Value>,
}

/// Inputs to the network's session-key signing endpoint.
struct SignSessionKeyArgs {
    session_key_uri: String,
    siwe_message: String,
    pkp_public_key: String,
    auth_methods: Vec<AuthMethod>,
    lit_action_code: Option<String>,
    lit_action_ipfs_id: Option<String>,
    js_params: Option<serde_json::Value>,
}

impl LitNodeClient {
    /// Build session signatures anchored to an external wallet.
    ///
    /// The wallet signature is cached and re-requested only when stale:
    /// failed verification, a different session key, missing resources,
    /// or missing capabilities for any requested pair.
    pub async fn get_session_sigs(&self, params: GetSessionSigsParams) -> Result<SessionSigsMap> {
        let snapshot = self.ready()?;
        let nonce = snapshot.latest_blockhash.clone();
        if nonce.is_empty() {
            return Err(Error::invalid_eth_blockhash(
                "connection snapshot has no latest blockhash",
            ));
        }

        let session_key = session_key::get_session_key(self.storage.as_ref()).await;
        let session_uri = session_key::session_key_uri(&session_key.public_key);

        let requests = params.resource_ability_requests.clone();
        let capabilities = params.session_capability_object.clone().unwrap_or_else(|| {
            let resources: Vec<_> = requests.iter().map(|r| r.resource.clone()).collect();
            CapabilityObject::from_resources(&resources)
        });

        let delegation_expiration = params
            .expiration
            .clone()
            .unwrap_or_else(|| iso_now_plus(delegation_lifetime()));
        let callback_params = AuthCallbackParams {
            session_key_uri: session_uri.clone(),
            statement: capabilities.statement(),
            resources: vec![capabilities.encode_as_siwe_resource()],
            chain: params.chain.clone(),
            nonce,
            expiration: delegation_expiration,
            domain: params.domain.clone(),
            switch_chain: params.switch_chain,
            lit_action_code: params.lit_action_code.clone(),
            lit_action_ipfs_id: params.lit_action_ipfs_id.clone(),
            js_params: params.js_params.clone(),
            resource_ability_requests: Some(requests.clone()),
        };

        let mut providers: Vec<AuthNeededCallback> = Vec::new();
        if let Some(callback) = params.auth_needed_callback.clone() {
            providers.push(callback);
        }
        if let Some(callback) = self.default_auth_callback.clone() {
            providers.push(callback);
        }

        let mut auth_sig =
            wallet_sig::get_wallet_sig(self.storage.as_ref(), &providers, &callback_params).await?;
        if wallet_sig::need_to_resign(&auth_sig, &session_uri, &requests) {
            auth_sig = wallet_sig::obtain_fresh_wallet_sig(
                self.storage.as_ref(),
                &providers,
                &callback_params,
            )
            .await?;
        }
        if !auth_sig.is_complete() {
            return Err(Error::wallet_signature_not_found(
                "wallet produced a structurally incomplete signature",
            ));
        }

        let mut capability_chain = params.capability_auth_sigs.clone();
        capability_chain.extend(params.capacity_delegation_auth_sig.clone());
        capability_chain.push(auth_sig);

        let sig_expiration = params
            .expiration
            .unwrap_or_else(|| iso_now_plus(session_sig_lifetime()));
        self.mint_session_sigs(&session_key, &requests, capability_chain, &sig_expiration)
    }

    /// Build session signatures anchored to the network itself: the
    /// nodes verify an auth-method proof and jointly sign the
    /// delegation, so no external wallet is involved.
    pub async fn get_pkp_session_sigs(
        &self,
        params: GetPkpSessionSigsParams,
    ) -> Result<SessionSigsMap> {
        self.pkp_rooted_session_sigs(params, None, None, None).await
    }

    /// Build session signatures gated by a user action: the nodes run
    /// the action against the auth context and sign only when it
    /// approves.
    pub async fn get_lit_action_session_sigs(
        &self,
        params: GetLitActionSessionSigsParams,
    ) -> Result<SessionSigsMap> {
        match (&params.lit_action_code, &params.lit_action_ipfs_id) {
            (None, None) => {
                return Err(Error::params_missing(
                    "one of litActionCode or litActionIpfsId is required",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::invalid_argument(
                    "litActionCode and litActionIpfsId are mutually exclusive",
                ))
            }
            _ => {}
        }
        if params.js_params.is_none() {
            return Err(Error::params_missing("jsParams is required"));
        }
        self.pkp_rooted_session_sigs(
            params.pkp,
            params.lit_action_code,
            params.lit_action_ipfs_id,
            params.js_params,
        )
        .await
    }

    async fn pkp_rooted_session_sigs(
        &self,
        params: GetPkpSessionSigsParams,
        lit_action_code: Option<String>,
        lit_action_ipfs_id: Option<String>,
        js_params: Option<serde_json::Value>,
    ) -> Result<SessionSigsMap> {
        let snapshot = self.ready()?;
        if params.pkp_public_key.is_empty() {
            return Err(Error::params_missing("pkpPublicKey is required"));
        }
        if params.auth_methods.is_empty() {
            return Err(Error::params_missing("at least one auth method is required"));
        }
        let nonce = snapshot.latest_blockhash.clone();
        if nonce.is_empty() {
            return Err(Error::invalid_eth_blockhash(
                "connection snapshot has no latest blockhash",
            ));
        }

        let session_key = session_key::get_session_key(self.storage.as_ref()).await;
        let session_uri = session_key::session_key_uri(&session_key.public_key);

        let requests = params.resource_ability_requests.clone();
        let resources: Vec<_> = requests.iter().map(|r| r.resource.clone()).collect();
        let capabilities = CapabilityObject::from_resources(&resources);

        let delegation_expiration = params
            .expiration
            .clone()
            .unwrap_or_else(|| iso_now_plus(delegation_lifetime()));
        let siwe_message = crate::auth::siwe::SiweMessage {
            domain: params.domain.clone().unwrap_or_else(|| "localhost".into()),
            address: pkp_eth_address(&params.pkp_public_key)?,
            statement: capabilities.statement(),
            uri: session_uri.clone(),
            version: "1".into(),
            chain_id: 1,
            nonce,
            issued_at: iso_now(),
            expiration_time: Some(delegation_expiration),
            resources: vec![capabilities.encode_as_siwe_resource()],
        }
        .render();

        let auth_sig = self
            .sign_session_key(SignSessionKeyArgs {
                session_key_uri: session_uri,
                siwe_message,
                pkp_public_key: params.pkp_public_key.clone(),
                auth_methods: params.auth_methods.clone(),
                lit_action_code,
                lit_action_ipfs_id,
                js_params,
            })
            .await?;
        if !auth_sig.is_complete() {
            return Err(Error::wallet_signature_not_found(
                "network produced a structurally incomplete signature",
            ));
        }

        let mut capability_chain = params.capability_auth_sigs.clone();
        capability_chain.extend(params.capacity_delegation_auth_sig.clone());
        capability_chain.push(auth_sig);

        let sig_expiration = params
            .expiration
            .unwrap_or_else(|| iso_now_plus(session_sig_lifetime()));
        self.mint_session_sigs(&session_key, &requests, capability_chain, &sig_expiration)
    }

    /// Ask every node for a share of a BLS signature over the session
    /// delegation, then combine into one network-issued `AuthSig`.
    async fn sign_session_key(&self, args: SignSessionKeyArgs) -> Result<AuthSig> {
        let snapshot = self.ready()?;
        let urls = snapshot.connected_nodes.clone();
        let min_count = snapshot.min_node_count.min(urls.len());

        let mut body = serde_json::json!({
            "sessionKey": args.session_key_uri,
            "authMethods": args.auth_methods,
            "pkpPublicKey": format!("0x{}", args.pkp_public_key.trim_start_matches("0x")),
            "siweMessage": args.siwe_message,
            "curveType": "BLS",
            "epoch": snapshot.current_epoch_number,
        });
        if let Some(code) = &args.lit_action_code {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine;
            body["code"] = serde_json::json!(STANDARD.encode(code));
        }
        if let Some(ipfs_id) = &args.lit_action_ipfs_id {
            body["litActionIpfsId"] = serde_json::json!(ipfs_id);
        }
        if let Some(js_params) = &args.js_params {
            body["jsParams"] = js_params.clone();
        }

        let batch = self
            .dispatcher
            .dispatch(&urls, "/web/sign_session_key", min_count, |_url| {
                Ok(body.clone())
            })
            .await?;
        let request_id = batch.request_id.clone();

        let mut shares: Vec<BlsSignatureShare> = Vec::new();
        for response in &batch.responses {
            match serde_json::from_value::<BlsSignatureShare>(response.value.clone()) {
                Ok(share) => shares.push(share),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "malformed session key share");
                }
            }
        }
        if shares.len() < min_count {
            return Err(Error::unknown(format!(
                "not enough session key signature shares: {} < {min_count}",
                shares.len()
            ))
            .with_request_id(request_id));
        }
        shares.sort_by_key(|share| share.share_index);

        let agreed = crypto::most_common(shares.clone(), |share| {
            share.siwe_message.clone().unwrap_or_default()
        })
        .expect("shares is non-empty");
        if !agreed.unanimous {
            tracing::warn!("nodes disagree on the signed delegation; combining the majority");
        }
        let siwe_message = agreed
            .value
            .siwe_message
            .clone()
            .unwrap_or_else(|| args.siwe_message.clone());

        let public_key_set = bls::public_key_set_from_hex(&snapshot.network_pub_key_set)?;
        let mut pairs = Vec::new();
        for share in shares
            .iter()
            .filter(|s| s.siwe_message.as_deref().unwrap_or_default()
                == agreed.value.siwe_message.as_deref().unwrap_or_default())
        {
            match bls::signature_share_from_hex(&share.signature_share) {
                Ok(parsed) => pairs.push((share.share_index, parsed)),
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable session key share; dropping");
                }
            }
        }
        let signature = bls::combine_signature_shares(&public_key_set, &pairs)
            .map_err(|e| e.with_request_id(request_id.clone()))?;
        if !public_key_set
            .public_key()
            .verify(&signature, siwe_message.as_bytes())
        {
            return Err(Error::unknown(
                "combined session key signature failed verification",
            )
            .with_request_id(request_id));
        }

        Ok(AuthSig {
            sig: hex::encode(signature.to_bytes()),
            derived_via: DERIVED_VIA_NETWORK_SIG.into(),
            signed_message: siwe_message,
            address: pkp_eth_address(&args.pkp_public_key)?,
            algo: Some("LIT_BLS".into()),
        })
    }

    /// Sign one template per connected node with the session secret key.
    fn mint_session_sigs(
        &self,
        session_key: &SessionKeyPair,
        requests: &[ResourceAbilityRequest],
        capability_chain: Vec<AuthSig>,
        expiration: &str,
    ) -> Result<SessionSigsMap> {
        let snapshot = self.ready()?;
        let issued_at = iso_now();

        let mut session_sigs = SessionSigsMap::new();
        for url in &snapshot.connected_nodes {
            let template = SessionSigningTemplate {
                session_key: session_key.public_key.clone(),
                resource_ability_requests: requests.to_vec(),
                capabilities: capability_chain.clone(),
                issued_at: issued_at.clone(),
                expiration: expiration.to_string(),
                node_address: url.clone(),
            };
            let message = serde_json::to_string(&template)
                .map_err(|e| Error::unknown(format!("failed to serialize template: {e}")))?;
            let sig = session_key::sign_with_session_key(session_key, message.as_bytes())?;
            session_sigs.insert(
                url.clone(),
                AuthSig {
                    sig,
                    derived_via: DERIVED_VIA_SESSION_SIG.into(),
                    signed_message: message,
                    address: session_key.public_key.clone(),
                    algo: Some("ed25519".into()),
                },
            );
        }
        Ok(session_sigs)
    }
}
