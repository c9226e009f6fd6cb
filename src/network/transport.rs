// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP transport to individual nodes.
//!
//! Kept behind a trait so the dispatcher and every operation can be
//! exercised against fakes; the reqwest implementation is the default in
//! production.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Header carrying the batch request id to every node.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A JSON POST transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url`, tagging the request with `request_id`.
    async fn post(
        &self,
        url: &str,
        body: serde_json::Value,
        request_id: &str,
    ) -> Result<serde_json::Value>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        body: serde_json::Value,
        request_id: &str,
    ) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(url)
            .header(REQUEST_ID_HEADER, request_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::unknown(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::unknown(format!(
                "node {url} returned HTTP {status}: {detail}"
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::unknown(format!("node {url} returned invalid JSON: {e}")))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    type Handler =
        Box<dyn Fn(&str, &serde_json::Value) -> Result<serde_json::Value> + Send + Sync>;

    /// Closure-backed transport for tests.
    pub(crate) struct FakeTransport {
        handler: Handler,
    }

    impl FakeTransport {
        pub(crate) fn new(
            handler: impl Fn(&str, &serde_json::Value) -> Result<serde_json::Value>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(
            &self,
            url: &str,
            body: serde_json::Value,
            _request_id: &str,
        ) -> Result<serde_json::Value> {
            (self.handler)(url, &body)
        }
    }
}
