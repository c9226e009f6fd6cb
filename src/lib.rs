// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side coordinator for a BLS/ECDSA threshold-signing network.
//!
//! A committee of nodes collectively holds the network's keys; this
//! crate lets an application delegate to a short-lived session key,
//! fan requests out to the committee, and combine the returned shares
//! into usable signatures, plaintexts, and claims.
//!
//! ## Modules
//!
//! - `auth` - Capability delegation, session keys, wallet signatures
//! - `client` - The node client and its operation surface
//! - `config` - Network presets and client configuration
//! - `crypto` - Share combination and aggregation primitives
//! - `network` - Fan-out, quorum collection, transport
//! - `storage` - Persistence slots for session material
//!
//! ## Typical flow
//!
//! ```rust,ignore
//! let mut client = LitNodeClient::new(LitNodeClientConfig::new(datil_dev()));
//! client.connect().await?;
//!
//! let session_sigs = client
//!     .get_session_sigs(GetSessionSigsParams::new("ethereum", vec![
//!         ResourceAbilityRequest::new(LitResource::any_pkp(), LitAbility::PkpSigning),
//!     ]))
//!     .await?;
//!
//! let signature = client
//!     .pkp_sign(PkpSignParams {
//!         to_sign: digest.to_vec(),
//!         pub_key: pkp_public_key,
//!         session_sigs: Some(session_sigs),
//!         auth_methods: vec![],
//!     })
//!     .await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod network;
pub mod storage;

pub use auth::capabilities::CapabilityObject;
pub use auth::AuthNeededCallback;
pub use client::{
    ClaimKeyIdParams, ClientState, ConditionSet, ConnectionSnapshot, DecryptParams, EncryptParams,
    ExecuteJsParams, GetLitActionSessionSigsParams, GetPkpSessionSigsParams, GetSessionSigsParams,
    LitNodeClient, MintCallback, PkpSignParams, SigningAccessControlParams,
};
pub use config::{datil, datil_dev, datil_test, LitNetwork, LitNodeClientConfig};
pub use error::{Error, ErrorKind, Result};
pub use models::{
    AuthCallbackParams, AuthMethod, AuthSig, ClaimData, ClaimKeyResponse, ClaimRequest,
    EncryptResponse, ExecuteJsResponse, LitAbility, LitResource, PkpSignature,
    ResourceAbilityRequest, ResponseStrategy, SessionKeyPair, SessionSigsMap, SignatureFragment,
};
pub use network::{HttpTransport, Transport};
pub use storage::{MemoryStorage, PersistenceAdapter};
