// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Model-proxy orchestration shared by the chat, completions, embeddings and
//! rerank endpoints.
//!
//! Checks run cheapest first: field presence, identifier format, rerank
//! capability, endpoint resolution, credential lookup. Only then is the
//! upstream called, exactly once.

use crate::models::model_id::ModelIdentifier;
use crate::models::proxy::{ForwardRequest, ForwardResult, ProxyProperties, PROPERTIES_FIELD};
use crate::services::credentials::CredentialResolver;
use crate::services::forwarder::Forward;
use crate::services::providers;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::SecretString;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Which upstream operation a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyEndpoint {
    ChatCompletions,
    Completions,
    Embeddings,
    Rerank,
}

impl ProxyEndpoint {
    /// Path appended to the provider base URL.
    pub fn path(&self) -> &'static str {
        match self {
            ProxyEndpoint::ChatCompletions => "/chat/completions",
            ProxyEndpoint::Completions => "/completions",
            ProxyEndpoint::Embeddings => "/embeddings",
            ProxyEndpoint::Rerank => "/rerank",
        }
    }
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyEndpoint::ChatCompletions => write!(f, "chat_completions"),
            ProxyEndpoint::Completions => write!(f, "completions"),
            ProxyEndpoint::Embeddings => write!(f, "embeddings"),
            ProxyEndpoint::Rerank => write!(f, "rerank"),
        }
    }
}

/// A request refused before any upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRejection {
    pub status: StatusCode,
    pub body: Value,
}

impl ProxyRejection {
    fn bad_request(body: Value) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body,
        }
    }

    fn missing_field(field: &str) -> Self {
        Self::bad_request(json!({
            "error": format!("missing required field: {field}"),
            "field": field,
        }))
    }
}

impl IntoResponse for ProxyRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Request envelope after validation, ready to be forwarded.
struct ValidatedRequest {
    model: ModelIdentifier,
    properties: ProxyProperties,
    body: Map<String, Value>,
}

/// Orchestrates one model-proxy call end to end.
pub struct ModelProxy {
    credentials: CredentialResolver,
    forwarder: Arc<dyn Forward>,
}

impl ModelProxy {
    pub fn new(credentials: CredentialResolver, forwarder: Arc<dyn Forward>) -> Self {
        Self {
            credentials,
            forwarder,
        }
    }

    /// Validate, resolve, sanitize and forward. The returned result may be an
    /// upstream error or a synthetic transport failure; both are relayed as-is.
    #[tracing::instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn handle(
        &self,
        endpoint: ProxyEndpoint,
        body: Value,
    ) -> Result<ForwardResult, ProxyRejection> {
        let request = validate(body)?;
        let provider = request.model.provider.as_str();

        if endpoint == ProxyEndpoint::Rerank && !providers::supports_rerank(provider) {
            tracing::info!(provider, "Rejected rerank for unsupported provider");
            return Err(ProxyRejection::bad_request(json!({
                "error": format!("provider '{provider}' does not support rerank"),
                "provider": provider,
                "supportedProviders": providers::rerank_providers(),
            })));
        }

        let base = providers::resolve_base(provider, request.properties.api_base.as_deref())
            .map_err(|e| {
                ProxyRejection::bad_request(json!({
                    "error": e.to_string(),
                    "provider": provider,
                }))
            })?;

        let api_key = self
            .credentials
            .resolve(Some(&request.properties.api_key_location))
            .map_err(|_| {
                ProxyRejection::bad_request(json!({"error": "failed to retrieve API key"}))
            })?;

        let forward = build_forward_request(request, &base, endpoint, api_key);
        tracing::info!(
            url = %forward.url,
            stream = forward.stream,
            "Forwarding model request"
        );

        Ok(self.forwarder.forward(forward).await)
    }
}

fn validate(body: Value) -> Result<ValidatedRequest, ProxyRejection> {
    let Value::Object(mut body) = body else {
        return Err(ProxyRejection::bad_request(
            json!({"error": "request body must be a JSON object"}),
        ));
    };

    let model = match body.get("model") {
        None | Some(Value::Null) => return Err(ProxyRejection::missing_field("model")),
        Some(Value::String(model)) => model.clone(),
        Some(_) => {
            return Err(ProxyRejection::bad_request(json!({
                "error": "model must be a string",
                "field": "model",
            })))
        }
    };

    let properties = match body.remove(PROPERTIES_FIELD) {
        None | Some(Value::Null) => return Err(ProxyRejection::missing_field(PROPERTIES_FIELD)),
        Some(raw) => serde_json::from_value::<ProxyProperties>(raw).map_err(|e| {
            ProxyRejection::bad_request(json!({
                "error": format!("invalid {PROPERTIES_FIELD}"),
                "field": PROPERTIES_FIELD,
                "details": e.to_string(),
            }))
        })?,
    };

    if properties.api_key_location.trim().is_empty() {
        return Err(ProxyRejection::missing_field(&format!(
            "{PROPERTIES_FIELD}.apiKeyLocation"
        )));
    }

    let model = ModelIdentifier::parse(&model).map_err(|e| {
        ProxyRejection::bad_request(json!({
            "error": "invalid model identifier",
            "model": model,
            "details": e.to_string(),
        }))
    })?;

    Ok(ValidatedRequest {
        model,
        properties,
        body,
    })
}

/// The provider sees only its bare model name; side-channel properties were
/// already removed during validation.
fn build_forward_request(
    request: ValidatedRequest,
    base: &str,
    endpoint: ProxyEndpoint,
    api_key: SecretString,
) -> ForwardRequest {
    let ValidatedRequest {
        model,
        properties,
        mut body,
    } = request;

    if let Some(org) = properties.org_scope_id.as_deref() {
        tracing::debug!(org_scope_id = org, model = %model, "Resolved model route");
    }

    body.insert("model".to_string(), Value::String(model.model_name));
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    ForwardRequest {
        url: format!("{}{}", base, endpoint.path()),
        api_key,
        body: Value::Object(body),
        stream,
    }
}
