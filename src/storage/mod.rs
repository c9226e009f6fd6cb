// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistence
//!
//! Key/value persistence for the two singleton slots the client keeps
//! between calls: the cached wallet signature and the session key pair.
//!
//! ## Semantics
//!
//! - Absence and parse errors are tolerated everywhere: a missing or
//!   corrupt slot simply triggers regeneration.
//! - Persistence failures never fail a request; callers log and continue.
//! - Slots are singletons per adapter. Multiple clients sharing one
//!   adapter get last-writer-wins semantics; callers needing isolation
//!   provide distinct adapters.

mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;

/// Slot holding the cached wallet signature (JSON `AuthSig`).
pub const WALLET_SIGNATURE_SLOT: &str = "lit-wallet-signature";

/// Slot holding the session key pair (JSON `SessionKeyPair`).
pub const SESSION_KEY_SLOT: &str = "lit-session-key";

/// Error type for persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store could not be read.
    #[error("storage read failed: {0}")]
    Read(String),
    /// The backing store could not be written.
    #[error("storage write failed: {0}")]
    Write(String),
}

/// A key/value persistence backend.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to
/// share across tasks.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Read a slot. `Ok(None)` when the slot has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a slot, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a slot. Removing an absent slot is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
