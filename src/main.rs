// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{Context, Result};
use calliope_gateway::app::{create_router, AppState, VERSION};
use calliope_gateway::models::settings::{SearchProviderKind, Settings};
use calliope_gateway::services::analytics::AnalyticsClient;
use calliope_gateway::services::crawl_orchestrator::Crawler;
use calliope_gateway::services::crawler::HttpPageFetcher;
use calliope_gateway::services::credentials::CredentialResolver;
use calliope_gateway::services::forwarder::HttpForwarder;
use calliope_gateway::services::logging::init_tracing;
use calliope_gateway::services::model_proxy::ModelProxy;
use calliope_gateway::services::search::{DocumentIndex, SearchClient};
use calliope_gateway::services::tool_client::{RemoteMarkdownConverter, ToolClientRegistry};
use calliope_gateway::services::web_search::{SearchBackend, SerperSearch, WebSearch};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();
    init_tracing(settings.log_format);
    tracing::debug!(?settings, "Loaded settings");

    let index = build_index(&settings).await;
    let tool_clients = ToolClientRegistry::new();

    let forwarder = HttpForwarder::new(Duration::from_secs(settings.upstream_timeout_secs))?;
    let model_proxy = ModelProxy::new(CredentialResolver::from_env(), Arc::new(forwarder));

    let mut state = AppState::new(Arc::new(model_proxy));
    state.web_search = build_web_search(&settings, index.clone())?;
    state.crawler = build_crawler(&settings, &tool_clients, index).await?;
    state.analytics = build_analytics(&settings)?;
    state.crawl_max_limit = settings.crawl_max_limit;
    state.dev_mode = settings.dev_mode;

    let app = create_router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(version = VERSION, %addr, "calliope-gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Meilisearch index, when configured and reachable enough to build a client.
async fn build_index(settings: &Settings) -> Option<Arc<dyn DocumentIndex>> {
    let host = settings.meilisearch_host.as_deref()?;

    match SearchClient::new(
        host,
        settings.meilisearch_api_key.clone(),
        settings.meilisearch_index.clone(),
    ) {
        Ok(client) => {
            if let Err(e) = client.init_index().await {
                tracing::warn!(error = %e, "Failed to initialize Meilisearch index");
            }
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Meilisearch client, continuing without index");
            None
        }
    }
}

fn build_web_search(
    settings: &Settings,
    index: Option<Arc<dyn DocumentIndex>>,
) -> Result<Option<Arc<dyn WebSearch>>> {
    let backend = match settings.search_provider {
        SearchProviderKind::Serper => match &settings.serper_api_key {
            Some(key) => SearchBackend::Serper(SerperSearch::new(key.clone())?),
            None => {
                tracing::warn!("SERPER_API_KEY is not set, web search disabled");
                return Ok(None);
            }
        },
        SearchProviderKind::Index => match index {
            Some(index) => SearchBackend::Index(index),
            None => {
                tracing::warn!("MEILISEARCH_HOST is not set, web search disabled");
                return Ok(None);
            }
        },
        SearchProviderKind::None => return Ok(None),
    };

    tracing::info!(provider = %settings.search_provider, "Web search enabled");
    Ok(Some(Arc::new(backend)))
}

async fn build_crawler(
    settings: &Settings,
    tool_clients: &ToolClientRegistry,
    index: Option<Arc<dyn DocumentIndex>>,
) -> Result<Option<Arc<Crawler>>> {
    let Some(url) = settings.markdown_service_url.as_deref() else {
        tracing::warn!("MARKDOWN_SERVICE_URL is not set, crawling disabled");
        return Ok(None);
    };

    let fetcher = HttpPageFetcher::new(
        settings.user_agent(),
        Duration::from_secs(settings.fetch_timeout_secs),
    )?;
    let converter = RemoteMarkdownConverter::new(tool_clients.client(url).await);

    let mut crawler = Crawler::new(Arc::new(fetcher), Arc::new(converter))
        .with_concurrency(settings.crawl_concurrency);
    if let Some(index) = index {
        crawler = crawler.with_index(index);
    }

    tracing::info!(markdown_service = url, "Crawling enabled");
    Ok(Some(Arc::new(crawler)))
}

fn build_analytics(settings: &Settings) -> Result<Option<Arc<AnalyticsClient>>> {
    match (&settings.analytics_host, &settings.analytics_api_key) {
        (Some(host), Some(key)) => {
            let client = AnalyticsClient::new(host, key.clone().into())?;
            Ok(Some(Arc::new(client)))
        }
        _ => Ok(None),
    }
}
