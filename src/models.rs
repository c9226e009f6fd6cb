// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Model
//!
//! This module defines the domain and wire types exchanged with the node
//! network and with callers. Wire types use camelCase field names to match
//! the node JSON protocol.
//!
//! ## Model Categories
//!
//! - **Authorization**: [`AuthSig`], [`SessionKeyPair`], capability
//!   resources and abilities, session signing templates
//! - **Node responses**: per-node share payloads for execute / sign /
//!   decrypt / claim batches
//! - **Results**: combined, caller-facing responses

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// Resources and Abilities
// =============================================================================

/// Resource prefix for access-control-condition resources.
pub const RESOURCE_PREFIX_ACC: &str = "lit-accesscontrolcondition";
/// Resource prefix for PKP resources.
pub const RESOURCE_PREFIX_PKP: &str = "lit-pkp";
/// Resource prefix for action resources.
pub const RESOURCE_PREFIX_LA: &str = "lit-litaction";

/// A network resource a capability can be granted over.
///
/// Rendered as `<prefix>://<id>`; the id `*` is the per-kind wildcard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LitResource {
    /// A PKP, identified by its public key (or `*`).
    Pkp(String),
    /// An action, identified by its content id (or `*`).
    LitAction(String),
    /// An access-control condition set, identified by its hash (or `*`).
    AccessControlCondition(String),
}

impl LitResource {
    /// Wildcard PKP resource.
    pub fn any_pkp() -> Self {
        LitResource::Pkp("*".into())
    }

    /// Wildcard action resource.
    pub fn any_action() -> Self {
        LitResource::LitAction("*".into())
    }

    /// Wildcard access-control-condition resource.
    pub fn any_access_control_condition() -> Self {
        LitResource::AccessControlCondition("*".into())
    }

    /// The resource prefix (scheme) for this resource kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            LitResource::Pkp(_) => RESOURCE_PREFIX_PKP,
            LitResource::LitAction(_) => RESOURCE_PREFIX_LA,
            LitResource::AccessControlCondition(_) => RESOURCE_PREFIX_ACC,
        }
    }

    /// The resource id (possibly `*`).
    pub fn id(&self) -> &str {
        match self {
            LitResource::Pkp(id)
            | LitResource::LitAction(id)
            | LitResource::AccessControlCondition(id) => id,
        }
    }

    /// Canonical key, e.g. `lit-pkp://*`.
    pub fn key(&self) -> String {
        format!("{}://{}", self.prefix(), self.id())
    }
}

impl fmt::Display for LitResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for LitResource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once("://")
            .ok_or_else(|| format!("not a resource key: {s}"))?;
        match prefix {
            RESOURCE_PREFIX_PKP => Ok(LitResource::Pkp(id.to_string())),
            RESOURCE_PREFIX_LA => Ok(LitResource::LitAction(id.to_string())),
            RESOURCE_PREFIX_ACC => Ok(LitResource::AccessControlCondition(id.to_string())),
            other => Err(format!("unknown resource prefix: {other}")),
        }
    }
}

impl Serialize for LitResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for LitResource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An ability a capability can grant over a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LitAbility {
    /// Threshold-ECDSA signing under a PKP.
    PkpSigning,
    /// Executing a sandboxed action.
    LitActionExecution,
    /// Conditional signing (signed JWTs) under access-control conditions.
    AccessControlConditionSigning,
    /// Threshold decryption under access-control conditions.
    AccessControlConditionDecryption,
}

impl LitAbility {
    /// Canonical ability tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            LitAbility::PkpSigning => "pkp-signing",
            LitAbility::LitActionExecution => "lit-action-execution",
            LitAbility::AccessControlConditionSigning => "access-control-condition-signing",
            LitAbility::AccessControlConditionDecryption => "access-control-condition-decryption",
        }
    }

    /// All ability tags, in canonical order.
    pub fn all() -> [LitAbility; 4] {
        [
            LitAbility::PkpSigning,
            LitAbility::LitActionExecution,
            LitAbility::AccessControlConditionSigning,
            LitAbility::AccessControlConditionDecryption,
        ]
    }
}

impl fmt::Display for LitAbility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LitAbility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pkp-signing" => Ok(LitAbility::PkpSigning),
            "lit-action-execution" => Ok(LitAbility::LitActionExecution),
            "access-control-condition-signing" => Ok(LitAbility::AccessControlConditionSigning),
            "access-control-condition-decryption" => {
                Ok(LitAbility::AccessControlConditionDecryption)
            }
            other => Err(format!("unknown ability: {other}")),
        }
    }
}

impl Serialize for LitAbility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LitAbility {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The `(resource, ability)` pair a call site demands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAbilityRequest {
    /// The resource the ability is demanded over.
    pub resource: LitResource,
    /// The demanded ability.
    pub ability: LitAbility,
}

impl ResourceAbilityRequest {
    /// Convenience constructor.
    pub fn new(resource: LitResource, ability: LitAbility) -> Self {
        Self { resource, ability }
    }
}

// =============================================================================
// Authorization Material
// =============================================================================

/// A detached signature over a structured message, used as an
/// authorization token.
///
/// Invariant: `sig` verifies `signed_message` under `address` using the
/// scheme implied by `derived_via`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    /// Opaque signature bytes (hex).
    pub sig: String,
    /// Tag identifying the signing scheme (e.g. `web3.eth.personal.sign`).
    pub derived_via: String,
    /// The exact message text that was signed.
    pub signed_message: String,
    /// Canonical hex account identifier of the signer.
    pub address: String,
    /// Signature algorithm, when the scheme alone is ambiguous.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
}

impl AuthSig {
    /// Structural check: every mandatory field is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.sig.is_empty()
            && !self.derived_via.is_empty()
            && !self.signed_message.is_empty()
            && !self.address.is_empty()
    }
}

/// `derivedVia` tag for session signatures minted with the session key.
pub const DERIVED_VIA_SESSION_SIG: &str = "litSessionSignViaNacl";

/// `derivedVia` tag for network-issued (BLS-combined) wallet signatures.
pub const DERIVED_VIA_NETWORK_SIG: &str = "lit.bls";

/// An Ed25519 session key pair, hex encoded.
///
/// The secret key is the 64-byte keypair encoding (seed followed by the
/// public key), matching the NaCl detached-signature convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKeyPair {
    /// 32-byte public key, lowercase hex.
    pub public_key: String,
    /// 64-byte keypair encoding, lowercase hex.
    pub secret_key: String,
}

/// Auth method categories accepted by the network.
pub mod auth_method {
    /// An externally-owned Ethereum wallet.
    pub const ETH_WALLET: u32 = 1;
    /// An action-bound auth method.
    pub const LIT_ACTION: u32 = 2;
    /// WebAuthn. Not accepted for key claims.
    pub const WEBAUTHN: u32 = 3;
    /// OAuth (Google) credential.
    pub const GOOGLE: u32 = 6;
}

/// An authentication proof submitted to the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMethod {
    /// One of the [`auth_method`] type tags.
    pub auth_method_type: u32,
    /// The proof material (JWT, signed challenge, …).
    pub access_token: String,
}

/// Parameters handed to a wallet callback when a fresh signature is
/// needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCallbackParams {
    /// The session key URI the wallet must sign over.
    pub session_key_uri: String,
    /// The capability statement to embed in the message.
    pub statement: String,
    /// Encoded capability resources (exactly one entry).
    pub resources: Vec<String>,
    /// Chain name for the delegation.
    pub chain: String,
    /// Latest chain blockhash, used as the nonce.
    pub nonce: String,
    /// ISO-8601 expiration of the delegation.
    pub expiration: String,
    /// Optional SIWE domain override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Ask the wallet to switch chains before signing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_chain: Option<bool>,
    /// Inline action source for action-bound auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lit_action_code: Option<String>,
    /// Content id of a published action for action-bound auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lit_action_ipfs_id: Option<String>,
    /// Parameters for the bound action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js_params: Option<serde_json::Value>,
    /// The capabilities the caller will demand from the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_ability_requests: Option<Vec<ResourceAbilityRequest>>,
}

/// The per-node payload signed by the session key.
///
/// Field order is load-bearing: the struct serializes in declaration
/// order and the exact JSON text is what gets signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSigningTemplate {
    /// Session public key, lowercase hex.
    pub session_key: String,
    /// Capabilities demanded for this session.
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
    /// The capability chain anchoring this session to wallet signatures.
    pub capabilities: Vec<AuthSig>,
    /// ISO-8601 issuance timestamp.
    pub issued_at: String,
    /// ISO-8601 expiration timestamp.
    pub expiration: String,
    /// The node this template is addressed to.
    pub node_address: String,
}

/// Map from node URL to the session signature minted for that node.
///
/// A `BTreeMap` keeps iteration deterministic.
pub type SessionSigsMap = BTreeMap<String, AuthSig>;

// =============================================================================
// Node Share Payloads
// =============================================================================

/// An ECDSA signature fragment returned by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcdsaSignedData {
    /// Signing scheme tag (e.g. `K256`).
    #[serde(default)]
    pub sig_type: String,
    /// Hex digest the node signed.
    pub data_signed: String,
    /// This node's additive share of `s`, hex.
    pub signature_share: String,
    /// Share index of the responding node.
    #[serde(default)]
    pub share_index: u64,
    /// The commitment point `R`, compressed SEC1 hex.
    pub big_r: String,
    /// The public key the signature verifies under.
    pub public_key: String,
    /// Caller-assigned signature name.
    #[serde(default)]
    pub sig_name: String,
}

/// A claim attestation fragment returned by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimShare {
    /// 65-byte recoverable signature, hex.
    pub signature: String,
    /// The derived key id the node attested.
    pub derived_key_id: String,
}

/// A BLS share returned by one node (decryption, JWT signing, or
/// session-key signing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlsSignatureShare {
    /// The node's share, hex.
    pub signature_share: String,
    /// Share index of the responding node.
    pub share_index: u64,
    /// Curve tag; always `BLS` for this share type.
    #[serde(default = "default_bls_curve")]
    pub curve_type: String,
    /// Hex digest or message the share signs, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_signed: Option<String>,
    /// The SIWE message the share signs, for session-key signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub siwe_message: Option<String>,
    /// The unsigned JWT body, for conditional signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned_jwt: Option<String>,
    /// Root BLS public key reported by the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bls_root_pubkey: Option<String>,
    /// Free-form node result tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

fn default_bls_curve() -> String {
    "BLS".to_string()
}

/// Per-node response to an execute call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteNodeShare {
    /// Whether the node reports success.
    #[serde(default)]
    pub success: bool,
    /// ECDSA fragments keyed by signature name.
    #[serde(default)]
    pub signed_data: BTreeMap<String, EcdsaSignedData>,
    /// Claim fragments keyed by claim name.
    #[serde(default)]
    pub claim_data: BTreeMap<String, ClaimShare>,
    /// The action's response value, as a string.
    #[serde(default)]
    pub response: String,
    /// Captured console output.
    #[serde(default)]
    pub logs: String,
}

// =============================================================================
// Combined Results
// =============================================================================

/// A combined threshold-ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkpSignature {
    /// `r` component, lowercase hex (no prefix).
    pub r: String,
    /// `s` component, lowercase hex (no prefix).
    pub s: String,
    /// Recovery id (0 or 1).
    pub recid: u8,
    /// 65-byte `r || s || v` encoding, 0x-prefixed hex, `v = 27 + recid`.
    pub signature: String,
    /// The public key the signature verifies under, 0x-prefixed hex.
    pub public_key: String,
    /// The digest that was signed, hex.
    pub data_signed: String,
}

/// An `r/s/v` fragment of a recoverable signature, as consumed by
/// on-chain verifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureFragment {
    /// `r`, 0x-prefixed hex.
    pub r: String,
    /// `s`, 0x-prefixed hex.
    pub s: String,
    /// Recovery byte (27 or 28).
    pub v: u8,
}

/// Combined claim data for one claim name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimData {
    /// One attestation per responding node.
    pub signatures: Vec<SignatureFragment>,
    /// The derived key id all attestations agree on.
    pub derived_key_id: String,
}

/// Caller-facing result of an execute call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteJsResponse {
    /// Whether the batch succeeded.
    pub success: bool,
    /// The action's response, JSON-parsed when possible.
    pub response: serde_json::Value,
    /// Combined console output.
    pub logs: String,
    /// Combined signatures keyed by signature name.
    pub signatures: BTreeMap<String, PkpSignature>,
    /// Combined claims keyed by claim name.
    pub claims: BTreeMap<String, ClaimData>,
}

/// Result of an encrypt call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResponse {
    /// The ciphertext, base64.
    pub ciphertext: String,
    /// SHA-256 of the plaintext, lowercase hex.
    pub data_to_encrypt_hash: String,
}

/// Payload handed to the mint callback after a successful claim batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    /// The derived key id being claimed.
    pub derived_key_id: String,
    /// Auth method type the claim was attested from.
    pub auth_method_type: u32,
    /// One attestation per node.
    pub signatures: Vec<SignatureFragment>,
    /// The derived public key, 0x-prefixed hex.
    pub pubkey: String,
    /// Network name, for the relay.
    pub network: String,
}

/// Caller-facing result of a claim call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimKeyResponse {
    /// One attestation per node.
    pub signatures: Vec<SignatureFragment>,
    /// The derived key id that was claimed.
    pub derived_key_id: String,
    /// The derived public key, 0x-prefixed hex.
    pub pubkey: String,
    /// Mint transaction id returned by the callback.
    pub mint_tx: String,
}

// =============================================================================
// Response Selection
// =============================================================================

/// How ties between equally-frequent node responses are broken.
///
/// Selection is always most-frequent-by-equality; the strategy applies
/// only when several response values tie for the highest count. Tie sets
/// are ordered lexicographically by canonical serialization.
#[derive(Clone, Default)]
pub enum ResponseStrategy {
    /// Take the first of the ordered tie set.
    #[default]
    LeastCommon,
    /// Take the last of the ordered tie set.
    MostCommon,
    /// Delegate to a caller-supplied picker over the ordered tie set;
    /// the returned index is clamped to the set.
    Custom(Arc<dyn Fn(&[String]) -> usize + Send + Sync>),
}

impl fmt::Debug for ResponseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStrategy::LeastCommon => write!(f, "LeastCommon"),
            ResponseStrategy::MostCommon => write!(f, "MostCommon"),
            ResponseStrategy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_keys_round_trip() {
        let resources = [
            LitResource::any_pkp(),
            LitResource::LitAction("QmfM2".into()),
            LitResource::AccessControlCondition("beef".into()),
        ];
        for resource in resources {
            let key = resource.key();
            let parsed: LitResource = key.parse().unwrap();
            assert_eq!(parsed, resource);
        }
        assert!("lit-unknown://*".parse::<LitResource>().is_err());
        assert!("no-scheme".parse::<LitResource>().is_err());
    }

    #[test]
    fn ability_tags_round_trip() {
        for ability in LitAbility::all() {
            let parsed: LitAbility = ability.as_str().parse().unwrap();
            assert_eq!(parsed, ability);
        }
    }

    #[test]
    fn template_serializes_in_declaration_order() {
        let template = SessionSigningTemplate {
            session_key: "ab".repeat(32),
            resource_ability_requests: vec![ResourceAbilityRequest::new(
                LitResource::any_pkp(),
                LitAbility::PkpSigning,
            )],
            capabilities: vec![],
            issued_at: "2026-01-01T00:00:00Z".into(),
            expiration: "2026-01-01T00:05:00Z".into(),
            node_address: "https://node-1:7470".into(),
        };
        let json = serde_json::to_string(&template).unwrap();
        let session_key_pos = json.find("sessionKey").unwrap();
        let requests_pos = json.find("resourceAbilityRequests").unwrap();
        let node_pos = json.find("nodeAddress").unwrap();
        assert!(session_key_pos < requests_pos && requests_pos < node_pos);
        assert!(json.contains(r#""ability":"pkp-signing""#));
        assert!(json.contains(r#""resource":"lit-pkp://*""#));
    }

    #[test]
    fn auth_sig_completeness() {
        let complete = AuthSig {
            sig: "aa".into(),
            derived_via: "web3.eth.personal.sign".into(),
            signed_message: "msg".into(),
            address: "0xabc".into(),
            algo: None,
        };
        assert!(complete.is_complete());

        let incomplete = AuthSig {
            sig: String::new(),
            ..complete
        };
        assert!(!incomplete.is_complete());
    }

    #[test]
    fn execute_node_share_tolerates_missing_fields() {
        let share: ExecuteNodeShare = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(share.success);
        assert!(share.signed_data.is_empty());
        assert!(share.claim_data.is_empty());
        assert_eq!(share.response, "");
    }
}
