// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deterministic selection of a small node subset.
//!
//! When an operation must run on the same few nodes every time (e.g. a
//! cached action), the subset is derived from the payload's content id:
//! hash a counter with the id, reduce modulo the node count, and keep
//! previously-unseen indices until enough are selected. Every client
//! computes the same subset for the same `(payload, nodes, k)`.

use crate::crypto::{sha256, sha256_hex};
use crate::error::{Error, Result};

/// Stable content id for an action payload.
pub fn action_content_id(code: &[u8]) -> String {
    sha256_hex(code)
}

/// Reduce a 32-byte digest modulo `modulus`.
fn digest_mod(digest: &[u8; 32], modulus: usize) -> usize {
    let modulus = modulus as u128;
    let mut acc: u128 = 0;
    for byte in digest {
        acc = (acc * 256 + *byte as u128) % modulus;
    }
    acc as usize
}

/// Select `target_count` distinct node indices out of `node_count`,
/// deterministically for a fixed `content_id`.
pub fn select_targeted_nodes(
    content_id: &str,
    node_count: usize,
    target_count: usize,
) -> Result<Vec<usize>> {
    if node_count == 0 {
        return Err(Error::invalid_argument("no nodes to select from"));
    }
    if target_count == 0 || target_count > node_count {
        return Err(Error::invalid_argument(format!(
            "target node count {target_count} out of range for {node_count} nodes"
        )));
    }

    let mut selected = Vec::with_capacity(target_count);
    let mut counter: u64 = 0;
    while selected.len() < target_count {
        let digest = sha256(format!("{counter}:{content_id}").as_bytes());
        let index = digest_mod(&digest, node_count);
        if !selected.contains(&index) {
            selected.push(index);
        }
        counter += 1;
    }
    Ok(selected)
}
