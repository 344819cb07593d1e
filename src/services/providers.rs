// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Default upstream endpoints for known model providers.

use thiserror::Error;

/// A provider the gateway knows how to reach without an explicit base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub name: &'static str,
    pub base_url: &'static str,
    pub supports_rerank: bool,
}

/// Static provider table. Bases end at the API version segment so endpoint
/// suffixes like `/chat/completions` append directly.
pub const KNOWN_PROVIDERS: &[ProviderEndpoint] = &[
    ProviderEndpoint {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        supports_rerank: false,
    },
    ProviderEndpoint {
        name: "anthropic",
        base_url: "https://api.anthropic.com/v1",
        supports_rerank: false,
    },
    ProviderEndpoint {
        name: "cohere",
        base_url: "https://api.cohere.com/v1",
        supports_rerank: true,
    },
    ProviderEndpoint {
        name: "gemini",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        supports_rerank: false,
    },
    ProviderEndpoint {
        name: "google",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        supports_rerank: false,
    },
    ProviderEndpoint {
        name: "mistral",
        base_url: "https://api.mistral.ai/v1",
        supports_rerank: false,
    },
    ProviderEndpoint {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        supports_rerank: false,
    },
    ProviderEndpoint {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        supports_rerank: false,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("apiBase is required for provider '{0}'")]
    ApiBaseRequired(String),
}

fn lookup(provider: &str) -> Option<&'static ProviderEndpoint> {
    KNOWN_PROVIDERS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(provider))
}

/// Pick the upstream base URL: the caller's explicit base if given, else the
/// provider default. Trailing slashes are stripped either way.
pub fn resolve_base(provider: &str, explicit_base: Option<&str>) -> Result<String, EndpointError> {
    if let Some(base) = explicit_base.map(str::trim).filter(|b| !b.is_empty()) {
        return Ok(base.trim_end_matches('/').to_string());
    }

    lookup(provider)
        .map(|p| p.base_url.trim_end_matches('/').to_string())
        .ok_or_else(|| EndpointError::ApiBaseRequired(provider.to_string()))
}

pub fn supports_rerank(provider: &str) -> bool {
    lookup(provider).is_some_and(|p| p.supports_rerank)
}

/// Names of providers that can serve rerank requests.
pub fn rerank_providers() -> Vec<&'static str> {
    KNOWN_PROVIDERS
        .iter()
        .filter(|p| p.supports_rerank)
        .map(|p| p.name)
        .collect()
}
