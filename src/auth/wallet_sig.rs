// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signature acquisition and staleness checking.
//!
//! A wallet signature is expensive to obtain (it prompts the user), so
//! the client caches it in the persistence slot and re-requests only when
//! the cached signature can no longer authorize the capabilities a call
//! site demands.
//!
//! ## Resolution order
//!
//! 1. The cached slot, when present and parseable.
//! 2. The caller-supplied providers, in order.
//! 3. Failure with `params_missing` when no provider exists.

use crate::auth::capabilities::CapabilityObject;
use crate::auth::siwe::{self, SiweMessage};
use crate::auth::AuthNeededCallback;
use crate::error::{Error, Result};
use crate::models::{AuthCallbackParams, AuthSig, ResourceAbilityRequest};
use crate::storage::{PersistenceAdapter, WALLET_SIGNATURE_SLOT};

/// Read the cached wallet signature, tolerating absence and corruption.
pub async fn read_cached_wallet_sig(storage: &dyn PersistenceAdapter) -> Option<AuthSig> {
    match storage.get(WALLET_SIGNATURE_SLOT).await {
        Ok(Some(raw)) => match serde_json::from_str::<AuthSig>(&raw) {
            Ok(auth_sig) => Some(auth_sig),
            Err(e) => {
                tracing::warn!(error = %e, "cached wallet signature is unparsable; ignoring");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read wallet signature slot; ignoring");
            None
        }
    }
}

/// Persist a freshly-obtained wallet signature, best effort.
pub async fn cache_wallet_sig(storage: &dyn PersistenceAdapter, auth_sig: &AuthSig) {
    let serialized = serde_json::to_string(auth_sig).expect("auth sig always serializes");
    if let Err(e) = storage.set(WALLET_SIGNATURE_SLOT, &serialized).await {
        tracing::warn!(error = %e, "failed to cache wallet signature; continuing");
    }
}

/// Obtain a wallet signature: cached if available, otherwise from the
/// first provider that yields one.
pub async fn get_wallet_sig(
    storage: &dyn PersistenceAdapter,
    providers: &[AuthNeededCallback],
    params: &AuthCallbackParams,
) -> Result<AuthSig> {
    if let Some(cached) = read_cached_wallet_sig(storage).await {
        return Ok(cached);
    }
    obtain_fresh_wallet_sig(storage, providers, params).await
}

/// Invoke the provider chain and write the result through to the cache.
pub async fn obtain_fresh_wallet_sig(
    storage: &dyn PersistenceAdapter,
    providers: &[AuthNeededCallback],
    params: &AuthCallbackParams,
) -> Result<AuthSig> {
    if providers.is_empty() {
        return Err(Error::params_missing(
            "no wallet signature is cached and no auth callback was provided",
        ));
    }

    let mut last_error = None;
    for provider in providers {
        match provider(params.clone()).await {
            Ok(auth_sig) => {
                cache_wallet_sig(storage, &auth_sig).await;
                return Ok(auth_sig);
            }
            Err(e) => {
                tracing::warn!(error = %e, "auth provider failed; trying next");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.expect("at least one provider ran"))
}

/// Whether the cached wallet signature must be re-obtained before it can
/// anchor a session demanding `requests`.
///
/// True when any of the following holds:
/// 1. the signature fails verification over its message;
/// 2. the message's URI is not `session_key_uri`;
/// 3. the message carries no resources;
/// 4. the decoded capability object misses any requested pair.
pub fn need_to_resign(
    auth_sig: &AuthSig,
    session_key_uri: &str,
    requests: &[ResourceAbilityRequest],
) -> bool {
    if !siwe::verify_eoa_signature(auth_sig) {
        tracing::debug!("wallet signature fails verification; re-signing");
        return true;
    }

    let message = match SiweMessage::parse(&auth_sig.signed_message) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "wallet signature message is unparsable; re-signing");
            return true;
        }
    };

    if message.uri != session_key_uri {
        tracing::debug!(
            expected = session_key_uri,
            actual = %message.uri,
            "wallet signature was issued for a different session key; re-signing"
        );
        return true;
    }

    let Some(encoded) = message.resources.first() else {
        tracing::debug!("wallet signature carries no resources; re-signing");
        return true;
    };
    let capabilities = match CapabilityObject::decode_siwe_resource(encoded) {
        Ok(capabilities) => capabilities,
        Err(e) => {
            tracing::debug!(error = %e, "wallet signature resources are undecodable; re-signing");
            return true;
        }
    };

    for request in requests {
        if !capabilities.verify_capabilities_for_resource(&request.resource, request.ability) {
            tracing::debug!(
                resource = %request.resource,
                ability = %request.ability,
                "wallet signature does not grant a required capability; re-signing"
            );
            return true;
        }
    }

    false
}
