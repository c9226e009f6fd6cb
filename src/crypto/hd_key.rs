// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deterministic derivation of claimed public keys.
//!
//! A claimed key is derived from the network's registered root public
//! keys and the claim's derived key id: each root contributes
//! `H(tag || keyId || root || index)·R_i`, and the child key is the sum.
//! Every client (and every node) computes the same child key for the
//! same id, so a claim can be minted on-chain before the key is ever
//! used.

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{FieldBytes, ProjectivePoint, Scalar, U256};

use crate::error::{Error, Result};

/// Domain separation tag mixed into every per-root scalar.
const HD_DERIVE_TAG: &[u8] = b"lit-hd-derived-key";

/// Derive the public key for `derived_key_id` (hex) from the network's
/// root public keys (SEC1 hex). Returns the uncompressed key,
/// 0x-prefixed.
pub fn compute_hd_pub_key(root_keys: &[String], derived_key_id: &str) -> Result<String> {
    if root_keys.is_empty() {
        return Err(Error::params_missing("no root public keys to derive from"));
    }
    let key_id = derived_key_id.strip_prefix("0x").unwrap_or(derived_key_id);
    let key_id_bytes = hex::decode(key_id)
        .map_err(|e| Error::invalid_param_type(format!("invalid derived key id: {e}")))?;

    let mut child = ProjectivePoint::IDENTITY;
    for (index, root_hex) in root_keys.iter().enumerate() {
        let root_bytes = hex::decode(root_hex.strip_prefix("0x").unwrap_or(root_hex))
            .map_err(|e| Error::invalid_param_type(format!("invalid root key hex: {e}")))?;
        let root = VerifyingKey::from_sec1_bytes(&root_bytes)
            .map_err(|e| Error::invalid_param_type(format!("invalid root key: {e}")))?;
        let root_compressed = root.to_encoded_point(true);

        let mut preimage = Vec::new();
        preimage.extend_from_slice(HD_DERIVE_TAG);
        preimage.extend_from_slice(&key_id_bytes);
        preimage.extend_from_slice(root_compressed.as_bytes());
        preimage.extend_from_slice(&(index as u32).to_be_bytes());
        let digest = super::sha256(&preimage);
        let tweak =
            <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&digest));

        child += ProjectivePoint::from(*root.as_affine()) * tweak;
    }

    if bool::from(child.is_identity()) {
        return Err(Error::unknown("derived key is the identity point"));
    }
    Ok(format!(
        "0x{}",
        hex::encode(child.to_affine().to_encoded_point(false).as_bytes())
    ))
}

#[cfg(test)]
mod tests {
    use k256::elliptic_curve::Field;

    use super::*;

    fn test_roots(n: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        (0..n)
            .map(|_| {
                let secret = Scalar::random(&mut rng);
                let point = ProjectivePoint::GENERATOR * secret;
                hex::encode(point.to_encoded_point(true).as_bytes())
            })
            .collect()
    }

    #[test]
    fn derivation_is_deterministic() {
        let roots = test_roots(3);
        let first = compute_hd_pub_key(&roots, "1234abcd").unwrap();
        let second = compute_hd_pub_key(&roots, "1234abcd").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("0x04"));
    }

    #[test]
    fn distinct_key_ids_derive_distinct_keys() {
        let roots = test_roots(2);
        let a = compute_hd_pub_key(&roots, "aa").unwrap();
        let b = compute_hd_pub_key(&roots, "bb").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(compute_hd_pub_key(&[], "aa").is_err());
        assert!(compute_hd_pub_key(&["zz".into()], "aa").is_err());
        let roots = test_roots(1);
        assert!(compute_hd_pub_key(&roots, "not-hex").is_err());
    }
}
