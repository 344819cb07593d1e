// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use calliope_gateway::app::{create_router, AppState};
use calliope_gateway::services::credentials::CredentialResolver;
use calliope_gateway::services::forwarder::HttpForwarder;
use calliope_gateway::services::model_proxy::ModelProxy;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FAKE_KEY: &str = "sk-test-0123456789";

fn gateway() -> Router {
    let resolver = CredentialResolver::with_lookup(|name| {
        (name == "PROVIDER_KEY").then(|| FAKE_KEY.to_string())
    });
    let forwarder = HttpForwarder::new(Duration::from_secs(5)).unwrap();
    let proxy = ModelProxy::new(resolver, Arc::new(forwarder));
    create_router(AppState::new(Arc::new(proxy)))
}

fn properties(api_base: &str) -> Value {
    json!({"apiKeyLocation": "env:PROVIDER_KEY", "apiBase": api_base})
}

async fn post(app: Router, uri: &str, body: Value, bearer: bool) -> axum::response::Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if bearer {
        request = request.header("Authorization", "Bearer caller-token");
    }
    app.oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_chat_completion_is_sanitized_and_relayed() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", format!("Bearer {FAKE_KEY}").as_str()))
        .and(body_json(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "upstream-1")
                .set_body_json(json!({"id": "chatcmpl-1", "choices": []})),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let response = post(
        gateway(),
        "/model-proxy/v1/chat/completions",
        json!({
            "model": "acme/assistant/openai/gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "calliopeProperties": properties(&upstream.uri()),
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "upstream-1");
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"id": "chatcmpl-1", "choices": []}));
}

#[tokio::test]
async fn test_stream_is_relayed_byte_for_byte() {
    let events = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                  data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
                  data: [DONE]\n\n";

    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_json(json!({
            "model": "gpt-3.5-turbo-instruct",
            "prompt": "Say hello",
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(events, "text/event-stream"))
        .mount(&upstream)
        .await;

    let response = post(
        gateway(),
        "/model-proxy/v1/completions",
        json!({
            "model": "acme/assistant/openai/gpt-3.5-turbo-instruct",
            "prompt": "Say hello",
            "stream": true,
            "calliopeProperties": properties(&upstream.uri()),
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(body_bytes(response).await, events.as_bytes());
}

#[tokio::test]
async fn test_upstream_rate_limit_passes_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&upstream)
        .await;

    let response = post(
        gateway(),
        "/model-proxy/v1/embeddings",
        json!({
            "model": "acme/search/openai/text-embedding-3-small",
            "input": "hello",
            "calliopeProperties": properties(&upstream.uri()),
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"]["message"], "Rate limit reached");
}

#[tokio::test]
async fn test_rerank_forwarded_for_capable_provider() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rerank"))
        .and(body_json(json!({
            "model": "rerank-english-v3.0",
            "query": "capital of France",
            "documents": ["Paris", "Berlin"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"index": 0, "relevance_score": 0.98}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = post(
        gateway(),
        "/model-proxy/v1/rerank",
        json!({
            "model": "acme/search/cohere/rerank-english-v3.0",
            "query": "capital of France",
            "documents": ["Paris", "Berlin"],
            "calliopeProperties": properties(&upstream.uri()),
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rerank_capability_checked_before_credentials() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let response = post(
        gateway(),
        "/model-proxy/v1/rerank",
        json!({
            "model": "x/y/openai/gpt-4",
            "query": "q",
            "documents": ["a"],
            "calliopeProperties": {"apiKeyLocation": "env:NOT_SET", "apiBase": upstream.uri()},
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "provider 'openai' does not support rerank");
}

#[tokio::test]
async fn test_missing_credential_is_rejected() {
    let response = post(
        gateway(),
        "/model-proxy/v1/chat/completions",
        json!({
            "model": "acme/assistant/openai/gpt-4",
            "messages": [],
            "calliopeProperties": {"apiKeyLocation": "env:NOT_SET"},
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"error": "failed to retrieve API key"}));
}

#[tokio::test]
async fn test_unreachable_upstream_is_synthetic_500() {
    let response = post(
        gateway(),
        "/model-proxy/v1/chat/completions",
        json!({
            "model": "acme/assistant/openai/gpt-4",
            "messages": [],
            "calliopeProperties": properties("http://127.0.0.1:1"),
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body["error"].is_string());
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_bearer_required_before_forwarding() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let response = post(
        gateway(),
        "/model-proxy/v1/chat/completions",
        json!({
            "model": "acme/assistant/openai/gpt-4",
            "messages": [],
            "calliopeProperties": properties(&upstream.uri()),
        }),
        false,
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = gateway();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/model-proxy/v1/chat/completions")
                .header("content-type", "application/json")
                .header("Authorization", "Bearer caller-token")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "invalid JSON body");
}

#[tokio::test]
async fn test_non_json_upstream_error_is_relayed_verbatim() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_raw("Bad Gateway", "text/plain"))
        .mount(&upstream)
        .await;

    let response = post(
        gateway(),
        "/model-proxy/v1/chat/completions",
        json!({
            "model": "acme/assistant/openai/gpt-4",
            "messages": [],
            "calliopeProperties": properties(&upstream.uri()),
        }),
        true,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(body_bytes(response).await, b"Bad Gateway");
}
