// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Threshold-ECDSA share combination.
//!
//! Nodes return additive fragments of `s` together with the shared
//! commitment point `R`; the full signature is `(x(R) mod n, Σ s_i)`,
//! normalized to low-s, with the recovery id resolved against the target
//! public key. Combination only proceeds over fragments that agree on
//! `(dataSigned, R)`; disagreeing fragments are dropped and the call
//! fails when fewer than the minimum node count remain.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::sec1::FromEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, Scalar, U256};

use crate::error::{Error, Result};
use crate::models::{EcdsaSignedData, PkpSignature};

/// Strip an optional `0x` prefix and decode hex.
fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).map_err(|e| Error::invalid_param_type(format!("invalid hex: {e}")))
}

/// Parse a 32-byte hex scalar.
pub fn scalar_from_hex(value: &str) -> Result<Scalar> {
    let bytes = decode_hex(value)?;
    if bytes.len() != 32 {
        return Err(Error::invalid_param_type(format!(
            "scalar: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    let repr = FieldBytes::clone_from_slice(&bytes);
    Option::<Scalar>::from(Scalar::from_repr(repr))
        .ok_or_else(|| Error::invalid_param_type("scalar out of field range"))
}

/// Parse a SEC1-encoded point and reduce its x-coordinate into the
/// scalar field (the `r` of an ECDSA signature).
pub fn x_coordinate_scalar(point_hex: &str) -> Result<Scalar> {
    let bytes = decode_hex(point_hex)?;
    let encoded = EncodedPoint::from_bytes(&bytes)
        .map_err(|e| Error::invalid_param_type(format!("invalid commitment point: {e}")))?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| Error::invalid_param_type("commitment point is not on the curve"))?;
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&affine.x()))
}

/// Combine ECDSA fragments into one canonical recoverable signature.
///
/// `min_count` is the minimum number of agreeing fragments (the
/// network's minimum node count).
pub fn combine_ecdsa_shares(
    shares: &[EcdsaSignedData],
    min_count: usize,
) -> Result<PkpSignature> {
    if shares.is_empty() {
        return Err(Error::params_missing("no signature shares to combine"));
    }

    // Fragments must agree on both the digest and the commitment point.
    let groups = super::tally_by_key(shares.to_vec(), |share| {
        format!("{}|{}", share.data_signed, share.big_r)
    });
    let winning = &groups[0];
    if groups.len() > 1 {
        tracing::warn!(
            groups = groups.len(),
            "signature shares disagree on signed data; combining the majority group"
        );
    }

    // One fragment per node; duplicates from a retried node are dropped.
    let mut agreeing: Vec<&EcdsaSignedData> = Vec::new();
    for share in &winning.items {
        if !agreeing.iter().any(|s| s.share_index == share.share_index) {
            agreeing.push(share);
        }
    }
    if agreeing.len() < min_count {
        return Err(Error::unknown(format!(
            "not enough agreeing signature shares: {} < {}",
            agreeing.len(),
            min_count
        )));
    }

    let first = agreeing[0];
    let r = x_coordinate_scalar(&first.big_r)?;
    let mut s = Scalar::ZERO;
    for share in &agreeing {
        s += scalar_from_hex(&share.signature_share)?;
    }

    let signature = EcdsaSignature::from_scalars(r.to_bytes(), s.to_bytes())
        .map_err(|e| Error::unknown(format!("invalid combined signature: {e}")))?;
    let signature = signature.normalize_s().unwrap_or(signature);

    let digest = decode_hex(&first.data_signed)?;
    let public_key_bytes = decode_hex(&first.public_key)?;
    let expected = VerifyingKey::from_sec1_bytes(&public_key_bytes)
        .map_err(|e| Error::invalid_param_type(format!("invalid public key: {e}")))?;

    let recid = resolve_recovery_id(&digest, &signature, &expected)?;

    let r_hex = hex::encode(signature.r().to_bytes());
    let s_hex = hex::encode(signature.s().to_bytes());
    Ok(PkpSignature {
        r: r_hex.clone(),
        s: s_hex.clone(),
        recid,
        signature: format!("0x{}{}{:02x}", r_hex, s_hex, 27 + recid),
        public_key: format!("0x{}", hex::encode(&public_key_bytes)),
        data_signed: first.data_signed.clone(),
    })
}

/// Split a 65-byte recoverable signature into its on-chain `r/s/v`
/// fragments, normalizing `v` to the 27/28 convention.
pub fn split_recoverable_signature(sig_hex: &str) -> Result<crate::models::SignatureFragment> {
    let bytes = decode_hex(sig_hex)?;
    if bytes.len() != 65 {
        return Err(Error::invalid_param_type(format!(
            "recoverable signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    let v = bytes[64];
    Ok(crate::models::SignatureFragment {
        r: format!("0x{}", hex::encode(&bytes[..32])),
        s: format!("0x{}", hex::encode(&bytes[32..64])),
        v: if v >= 27 { v } else { v + 27 },
    })
}

/// Find the recovery id under which `signature` recovers `expected`.
fn resolve_recovery_id(
    digest: &[u8],
    signature: &EcdsaSignature,
    expected: &VerifyingKey,
) -> Result<u8> {
    for byte in 0u8..=1 {
        let recid = RecoveryId::from_byte(byte).expect("recovery id 0 or 1");
        if let Ok(recovered) = VerifyingKey::recover_from_prehash(digest, signature, recid) {
            if &recovered == expected {
                return Ok(byte);
            }
        }
    }
    Err(Error::unknown(
        "combined signature does not recover the expected public key",
    ))
}

#[cfg(test)]
pub(crate) mod tests_support {
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use k256::elliptic_curve::Field;
    use k256::ProjectivePoint;

    use super::*;
    use crate::crypto::sha256;

    /// Build `n` additive fragments of a valid signature over `message`.
    pub(crate) fn simulated_shares_for(
        message: &[u8],
        n: usize,
    ) -> (Vec<EcdsaSignedData>, VerifyingKey) {
        let mut rng = rand::thread_rng();
        let secret = Scalar::random(&mut rng);
        let public_point = ProjectivePoint::GENERATOR * secret;
        let verifying_key =
            VerifyingKey::from_sec1_bytes(public_point.to_encoded_point(false).as_bytes()).unwrap();

        let digest = sha256(message);
        let m = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&digest));

        let k = Scalar::random(&mut rng);
        let big_r = (ProjectivePoint::GENERATOR * k.invert().unwrap()).to_affine();
        let big_r_hex = hex::encode(big_r.to_encoded_point(true).as_bytes());
        let r = <Scalar as Reduce<U256>>::reduce_bytes(&big_r.x());
        let s_total = k * (m + r * secret);

        let mut fragments = Vec::new();
        let mut acc = Scalar::ZERO;
        for index in 0..n {
            let fragment = if index == n - 1 {
                s_total - acc
            } else {
                let random = Scalar::random(&mut rng);
                acc += random;
                random
            };
            fragments.push(EcdsaSignedData {
                sig_type: "K256".into(),
                data_signed: hex::encode(digest),
                signature_share: hex::encode(fragment.to_bytes()),
                share_index: index as u64,
                big_r: big_r_hex.clone(),
                public_key: hex::encode(public_point.to_encoded_point(false).as_bytes()),
                sig_name: "sig".into(),
            });
        }
        (fragments, verifying_key)
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::simulated_shares_for as simulated_shares;
    use super::*;
    use crate::crypto::sha256;

    #[test]
    fn combines_fragments_into_a_recoverable_signature() {
        let (shares, verifying_key) = simulated_shares(b"hello", 3);
        let combined = combine_ecdsa_shares(&shares, 3).unwrap();

        let signature = EcdsaSignature::from_scalars(
            FieldBytes::clone_from_slice(&hex::decode(&combined.r).unwrap()),
            FieldBytes::clone_from_slice(&hex::decode(&combined.s).unwrap()),
        )
        .unwrap();
        let digest = sha256(b"hello");
        let recovered = VerifyingKey::recover_from_prehash(
            &digest,
            &signature,
            RecoveryId::from_byte(combined.recid).unwrap(),
        )
        .unwrap();
        assert_eq!(recovered, verifying_key);

        // 65-byte encoding carries v = 27 + recid.
        assert_eq!(combined.signature.len(), 2 + 130);
        assert!(combined.signature.starts_with("0x"));
    }

    #[test]
    fn combination_is_deterministic() {
        let (shares, _) = simulated_shares(b"stable", 4);
        let first = combine_ecdsa_shares(&shares, 3).unwrap();
        let second = combine_ecdsa_shares(&shares, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn shortfall_of_agreeing_shares_is_fatal() {
        let (mut shares, _) = simulated_shares(b"hello", 3);
        // Two of three nodes report a different digest.
        shares[1].data_signed = "ff".repeat(32);
        shares[2].data_signed = "ff".repeat(32);
        let err = combine_ecdsa_shares(&shares, 3).unwrap_err();
        assert!(err.message.contains("not enough agreeing"));
    }

    #[test]
    fn duplicate_share_indices_are_dropped() {
        let (mut shares, _) = simulated_shares(b"hello", 3);
        let duplicate = shares[0].clone();
        shares.push(duplicate);
        // Still combines: the duplicate does not double-count node 0.
        assert!(combine_ecdsa_shares(&shares, 3).is_ok());
    }

    #[test]
    fn rejects_malformed_inputs() {
        assert!(scalar_from_hex("beef").is_err());
        assert!(x_coordinate_scalar("0x02abcd").is_err());
        assert!(combine_ecdsa_shares(&[], 1).is_err());
    }

    #[test]
    fn splits_recoverable_signatures_and_normalizes_v() {
        let sig_hex = format!("{}{}{}", "11".repeat(32), "22".repeat(32), "00");
        let fragment = split_recoverable_signature(&sig_hex).unwrap();
        assert_eq!(fragment.r, format!("0x{}", "11".repeat(32)));
        assert_eq!(fragment.s, format!("0x{}", "22".repeat(32)));
        assert_eq!(fragment.v, 27);

        let already_normalized = format!("{}{}{}", "11".repeat(32), "22".repeat(32), "1c");
        assert_eq!(split_recoverable_signature(&already_normalized).unwrap().v, 28);

        assert!(split_recoverable_signature("beef").is_err());
    }
}
