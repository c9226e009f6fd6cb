// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Error Handling
//!
//! This module provides the unified error type returned by every fallible
//! operation in the crate.
//!
//! ## Shape
//!
//! Every error carries a machine-readable [`ErrorKind`], a human-readable
//! message, and — once any network request has actually been issued — the
//! request id of the batch that failed. Node-side failures additionally
//! carry per-node diagnostics so callers can see which nodes rejected the
//! request and why.
//!
//! ## Propagation rules
//!
//! - Parameter-shape and readiness errors are raised synchronously, before
//!   any network I/O.
//! - Node-side errors are collected per node and surfaced only after the
//!   whole batch completes or the retry budget is exhausted.
//! - Storage errors never fail a request; they are logged and recovered.

use std::fmt;

/// Machine-readable error category.
///
/// These map one-to-one onto the failure modes a caller can sensibly
/// branch on; everything else is [`ErrorKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorKind {
    /// A required parameter was not supplied.
    #[error("params missing")]
    ParamsMissing,
    /// A parameter was supplied but has the wrong shape or type.
    #[error("invalid param type")]
    InvalidParamType,
    /// A parameter combination is semantically invalid.
    #[error("invalid argument")]
    InvalidArgument,
    /// No usable chain blockhash was available for the SIWE nonce.
    #[error("invalid eth blockhash")]
    InvalidEthBlockhash,
    /// No wallet signature (or per-node session signature) was found.
    #[error("wallet signature not found")]
    WalletSignatureNotFound,
    /// The client is not in the `Ready` state.
    #[error("node client not ready")]
    NodeClientNotReady,
    /// A parameter was explicitly null where a value is required.
    #[error("param null")]
    ParamNull,
    /// A node batch failed: quorum not reached, or retries exhausted.
    #[error("node request failed")]
    NodeRequest,
    /// Anything that does not fit the categories above.
    #[error("unknown error")]
    Unknown,
}

impl ErrorKind {
    /// Stable string code for logs and structured API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ParamsMissing => "params_missing",
            ErrorKind::InvalidParamType => "invalid_param_type",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::InvalidEthBlockhash => "invalid_eth_blockhash",
            ErrorKind::WalletSignatureNotFound => "wallet_signature_not_found",
            ErrorKind::NodeClientNotReady => "node_client_not_ready",
            ErrorKind::ParamNull => "param_null",
            ErrorKind::NodeRequest => "node_request_failed",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

/// Diagnostic for a single node in a failed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDiagnostic {
    /// The node URL the request was sent to.
    pub url: String,
    /// What the node (or the transport) reported.
    pub message: String,
}

/// Unified error type for all client operations.
#[derive(Debug)]
pub struct Error {
    /// Machine-readable category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Batch request id, present when any request was actually issued.
    pub request_id: Option<String>,
    /// Per-node diagnostics for batch failures.
    pub node_diagnostics: Vec<NodeDiagnostic>,
}

impl Error {
    /// Create an error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            request_id: None,
            node_diagnostics: Vec::new(),
        }
    }

    /// A required parameter was not supplied.
    pub fn params_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParamsMissing, message)
    }

    /// A parameter has the wrong shape or type.
    pub fn invalid_param_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParamType, message)
    }

    /// A parameter combination is semantically invalid.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// No usable chain blockhash for the SIWE nonce.
    pub fn invalid_eth_blockhash(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEthBlockhash, message)
    }

    /// No wallet signature / per-node session signature available.
    pub fn wallet_signature_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WalletSignatureNotFound, message)
    }

    /// The client is not connected.
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NodeClientNotReady, message)
    }

    /// A parameter was explicitly null.
    pub fn param_null(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParamNull, message)
    }

    /// Catch-all for unexpected failures.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// A node batch failed with per-node diagnostics.
    pub fn node_request(message: impl Into<String>, diagnostics: Vec<NodeDiagnostic>) -> Self {
        Self {
            kind: ErrorKind::NodeRequest,
            message: message.into(),
            request_id: None,
            node_diagnostics: diagnostics,
        }
    }

    /// Attach the batch request id to this error.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)?;
        if let Some(request_id) = &self.request_id {
            write!(f, " (requestId: {request_id})")?;
        }
        if !self.node_diagnostics.is_empty() {
            write!(f, " — {} node error(s):", self.node_diagnostics.len())?;
            for diag in &self.node_diagnostics {
                write!(f, " [{}: {}]", diag.url, diag.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_message() {
        let err = Error::params_missing("code or ipfsId is required");
        assert_eq!(err.kind, ErrorKind::ParamsMissing);
        assert_eq!(err.message, "code or ipfsId is required");
        assert!(err.request_id.is_none());

        let err = Error::not_ready("call connect() first");
        assert_eq!(err.kind, ErrorKind::NodeClientNotReady);
    }

    #[test]
    fn display_includes_request_id_and_diagnostics() {
        let err = Error::node_request(
            "quorum not reached",
            vec![NodeDiagnostic {
                url: "https://node-1:7470".into(),
                message: "connection refused".into(),
            }],
        )
        .with_request_id("d6b29b3c");

        let rendered = err.to_string();
        assert!(rendered.contains("node_request_failed"));
        assert!(rendered.contains("requestId: d6b29b3c"));
        assert!(rendered.contains("https://node-1:7470"));
    }

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(
            ErrorKind::WalletSignatureNotFound.code(),
            "wallet_signature_not_found"
        );
        assert_eq!(ErrorKind::NodeClientNotReady.code(), "node_client_not_ready");
        assert_eq!(ErrorKind::InvalidEthBlockhash.code(), "invalid_eth_blockhash");
    }
}
