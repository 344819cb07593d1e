// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Single-attempt upstream calls for the model proxy.
//!
//! Every outcome, including transport failures, comes back as a
//! [`ForwardResult`] so callers have one relay path.

use crate::models::proxy::{ForwardBody, ForwardRequest, ForwardResult};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;

/// Headers that describe the upstream connection rather than the payload.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
];

/// Something that can execute a forward request.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, request: ForwardRequest) -> ForwardResult;
}

/// `reqwest`-backed forwarder.
pub struct HttpForwarder {
    client: reqwest::Client,
    buffered_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(buffered_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            buffered_timeout,
        })
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    #[tracing::instrument(skip_all, fields(url = %request.url, stream = request.stream))]
    async fn forward(&self, request: ForwardRequest) -> ForwardResult {
        let mut builder = self
            .client
            .post(&request.url)
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(request.api_key.expose_secret())
            .json(&request.body);

        // Streamed generations can legitimately run for minutes
        builder = if request.stream {
            builder.header(header::ACCEPT, "text/event-stream")
        } else {
            builder.timeout(self.buffered_timeout)
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        let status = response.status();
        let headers = relayable_headers(response.headers());
        tracing::debug!(status = %status, "Upstream responded");

        if request.stream && status.is_success() {
            let stream = response
                .bytes_stream()
                .map_err(std::io::Error::other)
                .boxed();
            return ForwardResult {
                status,
                headers,
                body: ForwardBody::Streamed(stream),
            };
        }

        // Streamed requests carry no client timeout, so bound the error body here
        match tokio::time::timeout(self.buffered_timeout, response.bytes()).await {
            Ok(Ok(bytes)) => ForwardResult {
                status,
                headers,
                body: parse_body(bytes),
            },
            Ok(Err(e)) => transport_failure(&e),
            Err(_) => {
                tracing::warn!(status = %status, "Upstream body not received in time");
                ForwardResult::synthetic(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "no response from upstream",
                    format!("upstream {status} body not received within {:?}", self.buffered_timeout),
                )
            }
        }
    }
}

/// Normalize a `reqwest` failure into a synthetic 500.
fn transport_failure(e: &reqwest::Error) -> ForwardResult {
    let details = error_chain(e);
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        tracing::warn!(error = %details, "No response from upstream");
        ForwardResult::synthetic(
            StatusCode::INTERNAL_SERVER_ERROR,
            "no response from upstream",
            details,
        )
    } else {
        tracing::error!(error = %details, "Unexpected upstream failure");
        ForwardResult::synthetic(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unexpected error",
            details,
        )
    }
}

fn error_chain(e: &dyn StdError) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// JSON when the upstream sent JSON, the bytes untouched otherwise, `{}` when empty.
fn parse_body(bytes: Bytes) -> ForwardBody {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return ForwardBody::Buffered(Value::Object(Default::default()));
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => ForwardBody::Buffered(value),
        Err(_) => ForwardBody::Raw(bytes),
    }
}

fn relayable_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers
}
