// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Threshold-BLS operations: share parsing, signature combination, and
//! the identity-bound encryption scheme.
//!
//! The network publishes its subnet public key and public key set during
//! the handshake; both are hex encodings of the `blsttc` wire formats.
//! Node shares arrive as hex strings paired with the node's share index,
//! and interpolation is entirely determined by `(index, share)` pairs, so
//! combining the same set twice yields the same signature.
//!
//! ## Identity binding
//!
//! A ciphertext is bound to an identity parameter by prepending the
//! parameter's SHA-256 digest to the plaintext envelope before
//! encryption. Decryption recombines node decryption shares and then
//! rejects the envelope unless the embedded digest matches the identity
//! parameter the caller presented, so shares authorized for one condition
//! set cannot release a payload bound to another.

use blsttc::{Ciphertext, DecryptionShare, PublicKey, PublicKeySet, Signature, SignatureShare};

use crate::error::{Error, Result};

/// Strip an optional `0x` prefix and decode hex.
fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).map_err(|e| Error::invalid_param_type(format!("invalid hex: {e}")))
}

fn fixed<const N: usize>(bytes: Vec<u8>, what: &str) -> Result<[u8; N]> {
    <[u8; N]>::try_from(bytes).map_err(|b| {
        Error::invalid_param_type(format!("{what}: expected {N} bytes, got {}", b.len()))
    })
}

/// Parse a BLS public key from its 48-byte hex encoding.
pub fn public_key_from_hex(value: &str) -> Result<PublicKey> {
    let bytes = fixed::<48>(decode_hex(value)?, "BLS public key")?;
    PublicKey::from_bytes(bytes)
        .map_err(|e| Error::invalid_param_type(format!("invalid BLS public key: {e}")))
}

/// Parse a BLS public key set from its hex encoding.
pub fn public_key_set_from_hex(value: &str) -> Result<PublicKeySet> {
    let bytes = decode_hex(value)?;
    PublicKeySet::from_bytes(bytes)
        .map_err(|e| Error::invalid_param_type(format!("invalid BLS public key set: {e}")))
}

/// Parse a node's signature share from its 96-byte hex encoding.
pub fn signature_share_from_hex(value: &str) -> Result<SignatureShare> {
    let bytes = fixed::<96>(decode_hex(value)?, "BLS signature share")?;
    SignatureShare::from_bytes(bytes)
        .map_err(|e| Error::invalid_param_type(format!("invalid BLS signature share: {e}")))
}

/// Parse a node's decryption share from its 48-byte hex encoding.
pub fn decryption_share_from_hex(value: &str) -> Result<DecryptionShare> {
    let bytes = fixed::<48>(decode_hex(value)?, "BLS decryption share")?;
    DecryptionShare::from_bytes(bytes)
        .map_err(|e| Error::invalid_param_type(format!("invalid BLS decryption share: {e}")))
}

/// Interpolate `(index, share)` pairs into a full signature.
///
/// Fails when fewer than `threshold + 1` distinct indices are present.
pub fn combine_signature_shares(
    public_key_set: &PublicKeySet,
    shares: &[(u64, SignatureShare)],
) -> Result<Signature> {
    public_key_set
        .combine_signatures(shares.iter().map(|(index, share)| (*index, share)))
        .map_err(|e| Error::unknown(format!("failed to combine signature shares: {e}")))
}

/// Verify a combined signature against the set's master public key.
pub fn verify(public_key_set: &PublicKeySet, signature: &Signature, message: &[u8]) -> bool {
    public_key_set.public_key().verify(signature, message)
}

/// Encrypt `data` to the subnet public key, bound to `identity_param`.
pub fn encrypt(subnet_public_key: &PublicKey, data: &[u8], identity_param: &[u8]) -> Vec<u8> {
    let mut envelope = Vec::with_capacity(32 + data.len());
    envelope.extend_from_slice(&super::sha256(identity_param));
    envelope.extend_from_slice(data);
    subnet_public_key.encrypt(envelope).to_bytes()
}

/// Recombine node decryption shares and release the payload, verifying
/// the ciphertext's identity binding against `identity_param`.
pub fn verify_and_decrypt_with_shares(
    public_key_set: &PublicKeySet,
    identity_param: &[u8],
    ciphertext: &[u8],
    shares: &[(u64, DecryptionShare)],
) -> Result<Vec<u8>> {
    let ciphertext = Ciphertext::from_bytes(ciphertext)
        .map_err(|e| Error::invalid_param_type(format!("invalid ciphertext: {e}")))?;
    if !ciphertext.verify() {
        return Err(Error::invalid_param_type("ciphertext integrity check failed"));
    }

    let envelope = public_key_set
        .decrypt(shares.iter().map(|(index, share)| (*index, share)), &ciphertext)
        .map_err(|e| Error::unknown(format!("failed to combine decryption shares: {e}")))?;

    if envelope.len() < 32 {
        return Err(Error::unknown("decrypted envelope is too short"));
    }
    let (bound_identity, payload) = envelope.split_at(32);
    if bound_identity != super::sha256(identity_param) {
        return Err(Error::invalid_argument(
            "ciphertext is bound to a different identity parameter",
        ));
    }
    Ok(payload.to_vec())
}
