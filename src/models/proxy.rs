// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::services::logging::mask_secret;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures::stream::BoxStream;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body field carrying the side-channel properties. Never forwarded upstream.
pub const PROPERTIES_FIELD: &str = "calliopeProperties";

/// Caller-supplied forwarding configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyProperties {
    /// Where to find the provider credential, e.g. `env:OPENAI_API_KEY`
    #[serde(default)]
    pub api_key_location: String,
    /// Explicit upstream base URL; overrides the provider default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Organisation scope, used only for log correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_scope_id: Option<String>,
    /// Free-form environment hints from the caller
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub env: Map<String, Value>,
}

/// Live upstream bytes. Consumable once.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Upstream payload as handed back to the orchestrator.
pub enum ForwardBody {
    Buffered(Value),
    /// Non-JSON upstream body, relayed verbatim with its own content type
    Raw(Bytes),
    Streamed(ByteStream),
}

impl std::fmt::Debug for ForwardBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardBody::Buffered(value) => f.debug_tuple("Buffered").field(value).finish(),
            ForwardBody::Raw(bytes) => write!(f, "Raw({} bytes)", bytes.len()),
            ForwardBody::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// Outcome of a single upstream attempt, success or failure alike.
#[derive(Debug)]
pub struct ForwardResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ForwardBody,
}

impl ForwardResult {
    /// Synthetic result for failures that never produced an upstream response.
    pub fn synthetic(status: StatusCode, error: &str, details: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ForwardBody::Buffered(serde_json::json!({
                "error": error,
                "details": details.into(),
            })),
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.body, ForwardBody::Streamed(_))
    }
}

/// One outbound call as built by the orchestrator.
#[derive(Clone)]
pub struct ForwardRequest {
    pub url: String,
    pub api_key: SecretString,
    pub body: Value,
    pub stream: bool,
}

impl std::fmt::Debug for ForwardRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardRequest")
            .field("url", &self.url)
            .field("api_key", &mask_secret(self.api_key.expose_secret()))
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}
