// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structured sign-in messages (EIP-4361) and their verification.
//!
//! The wallet delegation is a plain-text message with a fixed layout;
//! the signature over it follows the Ethereum personal-sign convention
//! (EIP-191 prefix, keccak256, secp256k1 recovery).

use alloy::primitives::keccak256;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::error::{Error, Result};
use crate::models::AuthSig;

/// A structured sign-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    /// Requesting origin (e.g. `localhost`).
    pub domain: String,
    /// Checksummed or lowercase signer account, 0x-prefixed.
    pub address: String,
    /// Human-readable delegation statement.
    pub statement: String,
    /// The URI being authorized (the session key URI).
    pub uri: String,
    /// Message version; always `1`.
    pub version: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Anti-replay nonce (the latest chain blockhash).
    pub nonce: String,
    /// ISO-8601 issuance timestamp.
    pub issued_at: String,
    /// ISO-8601 expiration timestamp.
    pub expiration_time: Option<String>,
    /// Resource URIs the delegation covers.
    pub resources: Vec<String>,
}

impl SiweMessage {
    /// Render the canonical message text.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} wants you to sign in with your Ethereum account:\n{}\n\n{}\n\nURI: {}\nVersion: {}\nChain ID: {}\nNonce: {}\nIssued At: {}",
            self.domain,
            self.address,
            self.statement,
            self.uri,
            self.version,
            self.chain_id,
            self.nonce,
            self.issued_at,
        );
        if let Some(expiration) = &self.expiration_time {
            out.push_str(&format!("\nExpiration Time: {expiration}"));
        }
        if !self.resources.is_empty() {
            out.push_str("\nResources:");
            for resource in &self.resources {
                out.push_str(&format!("\n- {resource}"));
            }
        }
        out
    }

    /// Parse a rendered message back into its fields.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();

        let first = lines
            .next()
            .ok_or_else(|| Error::invalid_param_type("empty sign-in message"))?;
        let domain = first
            .strip_suffix(" wants you to sign in with your Ethereum account:")
            .ok_or_else(|| Error::invalid_param_type("malformed sign-in preamble"))?
            .to_string();
        let address = lines
            .next()
            .ok_or_else(|| Error::invalid_param_type("missing account line"))?
            .to_string();

        let mut statement = String::new();
        let mut uri = None;
        let mut version = None;
        let mut chain_id = None;
        let mut nonce = None;
        let mut issued_at = None;
        let mut expiration_time = None;
        let mut resources = Vec::new();
        let mut in_resources = false;

        for line in lines {
            if let Some(value) = line.strip_prefix("URI: ") {
                uri = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("Version: ") {
                version = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("Chain ID: ") {
                chain_id = Some(value.parse::<u64>().map_err(|e| {
                    Error::invalid_param_type(format!("invalid chain id: {e}"))
                })?);
            } else if let Some(value) = line.strip_prefix("Nonce: ") {
                nonce = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("Issued At: ") {
                issued_at = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("Expiration Time: ") {
                expiration_time = Some(value.to_string());
            } else if line == "Resources:" {
                in_resources = true;
            } else if let Some(value) = line.strip_prefix("- ") {
                if in_resources {
                    resources.push(value.to_string());
                }
            } else if !line.is_empty() && uri.is_none() {
                if !statement.is_empty() {
                    statement.push('\n');
                }
                statement.push_str(line);
            }
        }

        Ok(Self {
            domain,
            address,
            statement,
            uri: uri.ok_or_else(|| Error::invalid_param_type("missing URI field"))?,
            version: version.unwrap_or_else(|| "1".to_string()),
            chain_id: chain_id.unwrap_or(1),
            nonce: nonce.ok_or_else(|| Error::invalid_param_type("missing Nonce field"))?,
            issued_at: issued_at
                .ok_or_else(|| Error::invalid_param_type("missing Issued At field"))?,
            expiration_time,
            resources,
        })
    }
}

/// EIP-191 personal-sign hash of a message.
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes()).0
}

/// Recover the signing account from a personal-sign signature,
/// 0x-prefixed lowercase hex.
pub fn recover_address(message: &str, sig_hex: &str) -> Result<String> {
    let sig_hex = sig_hex.strip_prefix("0x").unwrap_or(sig_hex);
    let bytes = hex::decode(sig_hex)
        .map_err(|e| Error::invalid_param_type(format!("invalid signature hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(Error::invalid_param_type(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    let v = bytes[64];
    let recid_byte = if v >= 27 { v - 27 } else { v };
    let recid = RecoveryId::from_byte(recid_byte)
        .ok_or_else(|| Error::invalid_param_type(format!("invalid recovery byte: {v}")))?;
    let signature = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| Error::invalid_param_type(format!("invalid signature: {e}")))?;

    let hash = personal_message_hash(message);
    let verifying_key = VerifyingKey::recover_from_prehash(&hash, &signature, recid)
        .map_err(|e| Error::invalid_param_type(format!("signature recovery failed: {e}")))?;

    Ok(address_of(&verifying_key))
}

/// The Ethereum account for a secp256k1 public key, 0x-prefixed
/// lowercase hex.
pub fn address_of(verifying_key: &VerifyingKey) -> String {
    let uncompressed = verifying_key.to_encoded_point(false);
    let digest = keccak256(&uncompressed.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Whether `auth_sig.sig` is a valid personal-sign signature over
/// `auth_sig.signed_message` by `auth_sig.address`.
pub fn verify_eoa_signature(auth_sig: &AuthSig) -> bool {
    match recover_address(&auth_sig.signed_message, &auth_sig.sig) {
        Ok(recovered) => recovered.eq_ignore_ascii_case(&auth_sig.address),
        Err(_) => false,
    }
}
