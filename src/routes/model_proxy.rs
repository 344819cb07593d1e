// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Model-proxy route handlers and the upstream response relay.

use crate::app::AppState;
use crate::models::proxy::{ByteStream, ForwardBody, ForwardResult};
use crate::services::model_proxy::ProxyEndpoint;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::{stream, StreamExt};
use serde_json::{json, Value};

/// Routes mounted under `/model-proxy/v1`.
pub fn model_proxy_router() -> Router<AppState> {
    Router::new()
        .route("/chat/completions", post(chat_completions_handler))
        .route("/completions", post(completions_handler))
        .route("/embeddings", post(embeddings_handler))
        .route("/rerank", post(rerank_handler))
}

async fn chat_completions_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    proxy(state, ProxyEndpoint::ChatCompletions, payload).await
}

async fn completions_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    proxy(state, ProxyEndpoint::Completions, payload).await
}

async fn embeddings_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    proxy(state, ProxyEndpoint::Embeddings, payload).await
}

async fn rerank_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    proxy(state, ProxyEndpoint::Rerank, payload).await
}

async fn proxy(
    state: AppState,
    endpoint: ProxyEndpoint,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid JSON body",
                    "details": rejection.body_text(),
                })),
            )
                .into_response()
        }
    };

    match state.model_proxy.handle(endpoint, body).await {
        Ok(result) => relay(result).await,
        Err(rejection) => rejection.into_response(),
    }
}

/// Turn a forward result into the caller's response without reshaping it.
pub async fn relay(result: ForwardResult) -> Response {
    let ForwardResult {
        status,
        headers,
        body,
    } = result;

    match body {
        ForwardBody::Buffered(value) => {
            let mut response = (status, Json(value)).into_response();
            copy_headers(response.headers_mut(), &headers, false);
            response
        }
        ForwardBody::Raw(bytes) => {
            let mut response = (status, bytes).into_response();
            response.headers_mut().remove(header::CONTENT_TYPE);
            copy_headers(response.headers_mut(), &headers, true);
            response
        }
        ForwardBody::Streamed(stream) => relay_stream(status, headers, stream).await,
    }
}

/// Stream errors can only become a status code before the first byte goes out,
/// so the first chunk is awaited before committing to the upstream status.
async fn relay_stream(status: StatusCode, upstream: HeaderMap, mut stream: ByteStream) -> Response {
    let first = match stream.next().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(e)) => {
            tracing::error!(error = %e, "Upstream stream failed before first byte");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "upstream stream failed",
                    "details": e.to_string(),
                })),
            )
                .into_response();
        }
        None => None,
    };

    let rest = stream.inspect(|chunk| {
        if let Err(e) = chunk {
            tracing::error!(error = %e, "Upstream stream failed mid-response");
        }
    });
    let body = Body::from_stream(stream::iter(first.map(Ok)).chain(rest));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    copy_headers(headers, &upstream, true);
    set_if_absent(headers, header::CONTENT_TYPE, "text/event-stream");
    set_if_absent(headers, header::CACHE_CONTROL, "no-cache");
    set_if_absent(headers, HeaderName::from_static("x-accel-buffering"), "no");
    response
}

/// Copy upstream headers. JSON bodies are re-serialized, so their content
/// type is ours, not the upstream's.
fn copy_headers(target: &mut HeaderMap, upstream: &HeaderMap, keep_content_type: bool) {
    for (name, value) in upstream.iter() {
        if !keep_content_type && name == header::CONTENT_TYPE {
            continue;
        }
        target.append(name.clone(), value.clone());
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: HeaderName, value: &'static str) {
    if !headers.contains_key(&name) {
        headers.insert(name, HeaderValue::from_static(value));
    }
}
