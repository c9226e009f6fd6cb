// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptographic Primitives and Aggregation Helpers
//!
//! Wrappers over the curve libraries plus the generic "most common"
//! aggregation used when reconciling node responses. The same helper
//! backs signed-digest selection, response-body selection, and log
//! selection; ties are always broken by lexicographic order of the
//! canonical serialization so that every client combines identically.

pub mod bls;
pub mod ecdsa;
pub mod hd_key;

use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256 of `data`, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// A group of items sharing one canonical key.
#[derive(Debug, Clone)]
pub struct TalliedGroup<T> {
    /// The canonical key the group agrees on.
    pub key: String,
    /// The items carrying that key, in arrival order.
    pub items: Vec<T>,
}

impl<T> TalliedGroup<T> {
    /// Number of items that agree on this key.
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Group `items` by canonical key and order groups by descending count,
/// breaking count ties by ascending key.
pub fn tally_by_key<T, I, K>(items: I, key_fn: K) -> Vec<TalliedGroup<T>>
where
    I: IntoIterator<Item = T>,
    K: Fn(&T) -> String,
{
    let mut groups: Vec<TalliedGroup<T>> = Vec::new();
    for item in items {
        let key = key_fn(&item);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.items.push(item),
            None => groups.push(TalliedGroup {
                key,
                items: vec![item],
            }),
        }
    }
    groups.sort_by(|a, b| b.count().cmp(&a.count()).then_with(|| a.key.cmp(&b.key)));
    groups
}

/// The winning value of a tally.
#[derive(Debug, Clone)]
pub struct MostCommon<T> {
    /// First item of the winning group.
    pub value: T,
    /// How many items agreed.
    pub count: usize,
    /// Whether every item agreed.
    pub unanimous: bool,
}

/// Most common value by canonical key, lexicographic tie-break.
pub fn most_common<T, I, K>(items: I, key_fn: K) -> Option<MostCommon<T>>
where
    I: IntoIterator<Item = T>,
    K: Fn(&T) -> String,
{
    let mut groups = tally_by_key(items, key_fn);
    if groups.is_empty() {
        return None;
    }
    let total: usize = groups.iter().map(TalliedGroup::count).sum();
    let mut winner = groups.remove(0);
    let count = winner.count();
    Some(MostCommon {
        value: winner.items.remove(0),
        count,
        unanimous: count == total,
    })
}
