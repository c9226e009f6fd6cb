// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization
//!
//! Capability delegation and session signing: the machinery that lets an
//! application authorize node operations without re-prompting the user's
//! wallet on every call.
//!
//! ## Flow
//!
//! 1. A [`capabilities::CapabilityObject`] describes which
//!    `(resource, ability)` pairs are being delegated.
//! 2. The wallet signs one structured sign-in message whose resource list
//!    carries the encoded capability object ([`siwe`], [`wallet_sig`]).
//! 3. A locally-held Ed25519 session key ([`session_key`]) then mints
//!    per-node session signatures anchored to that wallet signature.

pub mod capabilities;
pub mod session_key;
pub mod siwe;
pub mod wallet_sig;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::models::{AuthCallbackParams, AuthSig};

/// A provider of fresh wallet signatures.
///
/// Providers are tried in order; the first one to return a signature
/// wins. The callback receives the full signing context (session key
/// URI, statement, encoded resources, nonce, expiration).
pub type AuthNeededCallback =
    Arc<dyn Fn(AuthCallbackParams) -> BoxFuture<'static, Result<AuthSig>> + Send + Sync>;
