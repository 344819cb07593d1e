// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, route handlers, and router construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::models::analytics::CaptureRequest;
use crate::models::crawler::{CrawlBudget, CrawlPageResponse, CrawlRequest};
use crate::models::search::{ContextItem, WebSearchRequest};
use crate::models::version::HealthResponse;
use crate::routes::model_proxy_router;
use crate::services::analytics::AnalyticsClient;
use crate::services::auth_middleware::{require_bearer, require_extension_headers};
use crate::services::crawl_orchestrator::Crawler;
use crate::services::model_proxy::ModelProxy;
use crate::services::web_search::WebSearch;
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `GATEWAY_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("GATEWAY_VERSION");

pub const SERVICE_NAME: &str = "calliope-gateway";

const DEFAULT_SEARCH_RESULTS: usize = 5;
const MAX_SEARCH_RESULTS: usize = 20;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared application state injected into every route handler via `State<AppState>`.
/// Optional capabilities are `None` when not configured; their endpoints answer 503.
#[derive(Clone)]
pub struct AppState {
    pub model_proxy: Arc<ModelProxy>,
    pub web_search: Option<Arc<dyn WebSearch>>,
    pub crawler: Option<Arc<Crawler>>,
    pub analytics: Option<Arc<AnalyticsClient>>,
    /// Upper bound for a crawl request's `limit`
    pub crawl_max_limit: usize,
    /// Expose panic details in 500 responses
    pub dev_mode: bool,
}

impl AppState {
    pub fn new(model_proxy: Arc<ModelProxy>) -> Self {
        Self {
            model_proxy,
            web_search: None,
            crawler: None,
            analytics: None,
            crawl_max_limit: 100,
            dev_mode: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

#[utoipa::path(get, path = "/", responses((status = 200, body = HealthResponse)))]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: VERSION.to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/web",
    request_body = WebSearchRequest,
    responses(
        (status = 200, body = [ContextItem]),
        (status = 400, description = "Empty query"),
        (status = 401, description = "Missing extension headers"),
        (status = 503, description = "No search backend configured")
    )
)]
pub async fn web_handler(
    State(state): State<AppState>,
    Json(payload): Json<WebSearchRequest>,
) -> Result<Json<Vec<ContextItem>>, (StatusCode, String)> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query must not be empty".to_string()));
    }

    let search = state.web_search.as_ref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Search service is not available".to_string(),
        )
    })?;

    let max_results = payload
        .n
        .unwrap_or(DEFAULT_SEARCH_RESULTS)
        .clamp(1, MAX_SEARCH_RESULTS);

    search.search(query, max_results).await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Web search failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Search error: {e}"),
        )
    })
}

#[utoipa::path(
    post,
    path = "/crawl",
    request_body = CrawlRequest,
    responses(
        (status = 200, body = [CrawlPageResponse]),
        (status = 400, description = "Start URL is not http(s)"),
        (status = 401, description = "Missing extension headers"),
        (status = 503, description = "No markdown service configured")
    )
)]
pub async fn crawl_handler(
    State(state): State<AppState>,
    Json(payload): Json<CrawlRequest>,
) -> Result<Json<Vec<CrawlPageResponse>>, (StatusCode, String)> {
    let start_url = url::Url::parse(&payload.start_url)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid URL: {e}")))?;
    if !matches!(start_url.scheme(), "http" | "https") {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Unsupported URL scheme '{}'", start_url.scheme()),
        ));
    }

    let crawler = state.crawler.as_ref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Crawl service is not available".to_string(),
        )
    })?;

    let budget = CrawlBudget {
        max_depth: payload.max_depth,
        max_requests: payload.limit.min(state.crawl_max_limit),
    };

    let pages = crawler
        .launch_crawl(start_url.as_str(), budget)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Crawl failed to start");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Crawl error: {e}"),
            )
        })?;

    Ok(Json(pages.into_iter().map(CrawlPageResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/proxy/analytics/{workspace_id}/capture",
    request_body = CaptureRequest,
    params(("workspace_id" = String, Path, description = "Workspace the event belongs to")),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Missing event name"),
        (status = 401, description = "Missing bearer token"),
        (status = 502, description = "Analytics backend failed")
    )
)]
pub async fn capture_handler(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(payload): Json<CaptureRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if payload.event.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing required field: event"})),
        ));
    }

    let Some(analytics) = &state.analytics else {
        tracing::debug!(
            event = %payload.event,
            workspace_id = %workspace_id,
            "Analytics not configured, dropping event"
        );
        return Ok(Json(json!({})));
    };

    analytics
        .capture(&workspace_id, payload)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, workspace_id = %workspace_id, "Analytics capture failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": "failed to capture event"})),
            )
        })?;

    Ok(Json(json!({})))
}

/// Body for a handler panic. Details stay in the log unless `dev_mode` is on.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>, dev_mode: bool) -> Response {
    let details = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(details = %details, "Handler panicked");

    let body = if dev_mode {
        json!({"error": "internal server error", "details": details})
    } else {
        json!({"error": "internal server error"})
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    info(title = "calliope-gateway"),
    paths(health_handler, web_handler, crawl_handler, capture_handler),
    components(schemas(
        HealthResponse,
        WebSearchRequest,
        ContextItem,
        CrawlRequest,
        CrawlPageResponse,
        CaptureRequest
    ))
)]
pub struct ApiDoc;

/// Build the Axum application router.
///
/// `/web` and `/crawl` require the extension header set; the model proxy and
/// analytics capture require a bearer token.
pub fn create_router(state: AppState) -> Router {
    let dev_mode = state.dev_mode;

    let extension_routes = Router::new()
        .route("/web", post(web_handler))
        .route("/api/web", post(web_handler))
        .route("/crawl", post(crawl_handler))
        .route("/api/crawl", post(crawl_handler))
        .route_layer(middleware::from_fn(require_extension_headers));

    let bearer_routes = Router::new()
        .nest("/model-proxy/v1", model_proxy_router())
        .route(
            "/proxy/analytics/{workspace_id}/capture",
            post(capture_handler),
        )
        .route_layer(middleware::from_fn(require_bearer));

    Router::new()
        .route("/", get(health_handler))
        .merge(extension_routes)
        .merge(bearer_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CatchPanicLayer::custom(move |panic| {
            panic_response(panic, dev_mode)
        }))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::now_v7(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::crawler::FetchedPage;
    use crate::models::proxy::{ForwardRequest, ForwardResult};
    use crate::services::auth_middleware::EXTENSION_HEADERS;
    use crate::services::crawler::PageFetcher;
    use crate::services::credentials::CredentialResolver;
    use crate::services::forwarder::Forward;
    use crate::services::tool_client::MarkdownConverter;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::Body;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct UnreachableForwarder;

    #[async_trait]
    impl Forward for UnreachableForwarder {
        async fn forward(&self, _request: ForwardRequest) -> ForwardResult {
            ForwardResult::synthetic(
                StatusCode::INTERNAL_SERVER_ERROR,
                "no response from upstream",
                "test forwarder",
            )
        }
    }

    /// Returns three fixed items and records the requested result count.
    #[derive(Default)]
    struct StubSearch {
        requested: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl WebSearch for StubSearch {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ContextItem>> {
            self.requested.lock().unwrap().push(max_results);
            Ok((1..=3)
                .map(|i| ContextItem {
                    name: format!("{query} {i}"),
                    description: format!("description {i}"),
                    content: format!("content {i}"),
                    uri: Some(format!("https://example.com/{i}")),
                })
                .collect())
        }
    }

    struct OnePageFetcher;

    #[async_trait]
    impl PageFetcher for OnePageFetcher {
        async fn fetch(&self, url: &url::Url) -> Result<FetchedPage> {
            Ok(FetchedPage {
                html: "<title>Docs</title><p>Hello</p>".to_string(),
                title: Some("Docs".to_string()),
                final_url: url.clone(),
            })
        }
    }

    struct EchoConverter;

    #[async_trait]
    impl MarkdownConverter for EchoConverter {
        async fn convert(&self, _html: &str) -> Result<String> {
            Ok("# Docs\n\nHello".to_string())
        }
    }

    fn test_state() -> AppState {
        let resolver = CredentialResolver::with_lookup(|_| None);
        AppState::new(Arc::new(ModelProxy::new(
            resolver,
            Arc::new(UnreachableForwarder),
        )))
    }

    fn json_request(uri: &str) -> axum::http::request::Builder {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
    }

    fn with_extension_headers(
        mut builder: axum::http::request::Builder,
    ) -> axum::http::request::Builder {
        for name in EXTENSION_HEADERS {
            builder = builder.header(name, "test");
        }
        builder
    }

    async fn send(app: Router, builder: axum::http::request::Builder, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(test_state());
        let response = app
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.service, SERVICE_NAME);
        assert_eq!(health.version, VERSION);
    }

    #[tokio::test]
    async fn test_version_follows_semver_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.parse::<u32>().is_ok()));
    }

    #[tokio::test]
    async fn test_invalid_route_returns_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/invalid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_web_requires_extension_headers() {
        let app = create_router(test_state());
        let body = json!({"query": "test"});
        let (status, _) = send(app, json_request("/web"), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_web_returns_backend_items() {
        let search = Arc::new(StubSearch::default());
        let mut state = test_state();
        state.web_search = Some(search.clone());

        for path in ["/web", "/api/web"] {
            let body = json!({"query": "test", "n": 2});
            let (status, value) = send(
                create_router(state.clone()),
                with_extension_headers(json_request(path)),
                body,
            )
            .await;

            assert_eq!(status, StatusCode::OK);
            let items: Vec<ContextItem> = serde_json::from_value(value).unwrap();
            assert_eq!(items.len(), 3);
            assert_eq!(items[0].name, "test 1");
            assert!(items.iter().all(|i| !i.description.is_empty() && !i.content.is_empty()));
        }
        assert_eq!(*search.requested.lock().unwrap(), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_web_clamps_result_count() {
        let search = Arc::new(StubSearch::default());
        let mut state = test_state();
        state.web_search = Some(search.clone());

        for n in [json!(100), json!(0), Value::Null] {
            let body = json!({"query": "test", "n": n});
            let (status, _) = send(
                create_router(state.clone()),
                with_extension_headers(json_request("/web")),
                body,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(*search.requested.lock().unwrap(), vec![20, 1, 5]);
    }

    #[tokio::test]
    async fn test_web_rejects_empty_query() {
        let mut state = test_state();
        state.web_search = Some(Arc::new(StubSearch::default()));
        let body = json!({"query": "   "});
        let (status, _) = send(
            create_router(state),
            with_extension_headers(json_request("/web")),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_web_without_backend_is_unavailable() {
        let body = json!({"query": "test"});
        let (status, _) = send(
            create_router(test_state()),
            with_extension_headers(json_request("/web")),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_crawl_validates_start_url_first() {
        let body = json!({"startUrl": "ftp://example.com"});
        let (status, _) = send(
            create_router(test_state()),
            with_extension_headers(json_request("/crawl")),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body = json!({"startUrl": "https://example.com"});
        let (status, _) = send(
            create_router(test_state()),
            with_extension_headers(json_request("/crawl")),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_crawl_returns_pages() {
        let mut state = test_state();
        state.crawler = Some(Arc::new(Crawler::new(
            Arc::new(OnePageFetcher),
            Arc::new(EchoConverter),
        )));

        let body = json!({"startUrl": "https://example.com/docs", "maxDepth": 0, "limit": 5});
        let (status, value) = send(
            create_router(state),
            with_extension_headers(json_request("/api/crawl")),
            body,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            value,
            json!([{
                "url": "https://example.com/docs",
                "path": "/docs",
                "content": "# Docs\n\nHello",
                "title": "Docs"
            }])
        );
    }

    #[tokio::test]
    async fn test_model_proxy_requires_bearer() {
        let body = json!({"model": "o/p/openai/gpt-4"});
        let (status, _) = send(
            create_router(test_state()),
            json_request("/model-proxy/v1/chat/completions"),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_model_proxy_validation_through_router() {
        let body = json!({"messages": []});
        let (status, value) = send(
            create_router(test_state()),
            json_request("/model-proxy/v1/chat/completions")
                .header("Authorization", "Bearer token"),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["field"], "model");
    }

    #[tokio::test]
    async fn test_capture_without_backend_is_accepted() {
        let body = json!({"event": "opened", "properties": {}, "uniqueId": "u1"});
        let (status, value) = send(
            create_router(test_state()),
            json_request("/proxy/analytics/ws-1/capture")
                .header("Authorization", "Bearer token"),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_capture_rejects_empty_event() {
        let body = json!({"event": "", "uniqueId": "u1"});
        let (status, _) = send(
            create_router(test_state()),
            json_request("/proxy/analytics/ws-1/capture")
                .header("Authorization", "Bearer token"),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_panic_response_hides_details_outside_dev_mode() {
        let response = panic_response(Box::new("boom".to_string()), false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"error": "internal server error"}));

        let response = panic_response(Box::new("boom"), true);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["details"], "boom");
    }

    #[tokio::test]
    async fn test_concurrent_requests_succeed() {
        let app = create_router(test_state());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    app.oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
                        .await
                        .unwrap()
                        .status()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }
    }
}
