// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Web search backends behind the `/web` endpoint.

use crate::models::search::ContextItem;
use crate::services::search::DocumentIndex;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const SERPER_URL: &str = "https://google.serper.dev/search";

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ContextItem>>;
}

/// The configured backend, chosen once at startup.
pub enum SearchBackend {
    Serper(SerperSearch),
    Index(Arc<dyn DocumentIndex>),
}

#[async_trait]
impl WebSearch for SearchBackend {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ContextItem>> {
        match self {
            SearchBackend::Serper(serper) => serper.search(query, max_results).await,
            SearchBackend::Index(index) => {
                let hits = index.similarity_search(query, max_results).await?;
                Ok(hits
                    .into_iter()
                    .map(|hit| {
                        let doc = hit.document;
                        ContextItem {
                            name: doc.title.unwrap_or_else(|| doc.url.clone()),
                            description: doc.excerpt,
                            content: doc.content,
                            uri: Some(doc.url),
                        }
                    })
                    .collect())
            }
        }
    }
}

/// Google results through the Serper API.
pub struct SerperSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearch {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_endpoint(api_key, SERPER_URL.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ContextItem>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({"q": query, "num": max_results}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Serper search failed: {} {}", status, body));
        }

        let results: SerperResponse = response.json().await?;
        Ok(results
            .organic
            .into_iter()
            .take(max_results)
            .map(|r| ContextItem {
                name: r.title,
                description: r.snippet.clone(),
                content: r.snippet,
                uri: Some(r.link),
            })
            .collect())
    }
}
