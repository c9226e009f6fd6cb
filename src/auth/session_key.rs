// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session key lifecycle.
//!
//! The session key is an Ed25519 pair the client uses to mint per-node
//! authorizations without re-prompting the user's wallet. It is created
//! lazily on first use, persisted under a fixed slot, and reused across
//! calls until explicitly rotated. Persistence failures are logged and
//! swallowed: a session can always run on a fresh in-memory key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::models::SessionKeyPair;
use crate::storage::{PersistenceAdapter, SESSION_KEY_SLOT};

/// URI scheme binding a session to its public key.
pub const SESSION_KEY_URI_PREFIX: &str = "lit:session:";

/// The URI the wallet signs over when delegating to a session key.
pub fn session_key_uri(public_key_hex: &str) -> String {
    format!("{SESSION_KEY_URI_PREFIX}{public_key_hex}")
}

/// Generate a fresh Ed25519 session key pair.
pub fn generate_session_key_pair() -> SessionKeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    SessionKeyPair {
        public_key: hex::encode(signing_key.verifying_key().to_bytes()),
        secret_key: hex::encode(signing_key.to_keypair_bytes()),
    }
}

/// Structural check: does `value` look like a persisted session key
/// pair?
pub fn is_session_key_pair(value: &serde_json::Value) -> bool {
    let hex_field = |name: &str, len: usize| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit()))
    };
    hex_field("publicKey", 64) && hex_field("secretKey", 128)
}

/// Return the persisted session key, generating and persisting a fresh
/// one on miss or parse failure.
pub async fn get_session_key(storage: &dyn PersistenceAdapter) -> SessionKeyPair {
    match storage.get(SESSION_KEY_SLOT).await {
        Ok(Some(raw)) => {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                if is_session_key_pair(&value) {
                    if let Ok(pair) = serde_json::from_value::<SessionKeyPair>(value) {
                        return pair;
                    }
                }
            }
            tracing::warn!("persisted session key is malformed; generating a fresh one");
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to read session key slot; generating a fresh one");
        }
    }

    let pair = generate_session_key_pair();
    let serialized = serde_json::to_string(&pair).expect("session key pair always serializes");
    if let Err(e) = storage.set(SESSION_KEY_SLOT, &serialized).await {
        tracing::warn!(error = %e, "failed to persist session key; continuing with in-memory key");
    }
    pair
}

/// Detached Ed25519 signature of `message` under the session secret key,
/// lowercase hex.
pub fn sign_with_session_key(pair: &SessionKeyPair, message: &[u8]) -> Result<String> {
    let bytes = hex::decode(&pair.secret_key)
        .map_err(|e| Error::invalid_param_type(format!("invalid session secret key: {e}")))?;
    let keypair: [u8; 64] = bytes
        .try_into()
        .map_err(|_| Error::invalid_param_type("session secret key must be 64 bytes"))?;
    let signing_key = SigningKey::from_keypair_bytes(&keypair)
        .map_err(|e| Error::invalid_param_type(format!("invalid session secret key: {e}")))?;
    Ok(hex::encode(signing_key.sign(message).to_bytes()))
}

/// Verify a detached session signature against a session public key.
pub fn verify_session_signature(public_key_hex: &str, message: &[u8], sig_hex: &str) -> bool {
    let Ok(public_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(public_array) = <[u8; 32]>::try_from(public_bytes) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_array) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes) else {
        return false;
    };
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_array))
        .is_ok()
}
