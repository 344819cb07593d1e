// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::search::{IndexedDocument, SimilarityResult};
use anyhow::Result;
use async_trait::async_trait;
use meilisearch_sdk::client::Client;

/// Store for crawled documents with similarity lookup.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn add_documents(&self, docs: &[IndexedDocument]) -> Result<()>;
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SimilarityResult>>;
}

/// Meilisearch client wrapper for indexing and searching crawled documents
pub struct SearchClient {
    client: Client,
    index_name: String,
}

impl SearchClient {
    /// Create a new Meilisearch client
    pub fn new(host: &str, api_key: Option<String>, index_name: String) -> Result<Self> {
        // Construct the full URL if only host:port is provided
        let url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        let client = Client::new(&url, api_key)?;

        tracing::info!(url = %url, index = %index_name, "Configured Meilisearch client");

        Ok(Self { client, index_name })
    }

    /// Initialize the documents index with proper settings
    pub async fn init_index(&self) -> Result<()> {
        let index = self.client.index(&self.index_name);

        index
            .set_searchable_attributes(["title", "content", "url"])
            .await
            .map_err(|e| anyhow::anyhow!("Failed to configure index: {}", e))?;
        index
            .set_filterable_attributes(["path"])
            .await
            .map_err(|e| anyhow::anyhow!("Failed to configure index: {}", e))?;

        tracing::info!(index = %self.index_name, "Initialized Meilisearch index");

        Ok(())
    }
}

#[async_trait]
impl DocumentIndex for SearchClient {
    async fn add_documents(&self, docs: &[IndexedDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let index = self.client.index(&self.index_name);
        index
            .add_documents(docs, Some("id"))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to index documents: {}", e))?;

        tracing::debug!(count = docs.len(), "Indexed documents");

        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SimilarityResult>> {
        let index = self.client.index(&self.index_name);

        let search_result = index
            .search()
            .with_query(query)
            .with_limit(k.min(1000))
            .with_show_ranking_score(true)
            .execute::<IndexedDocument>()
            .await
            .map_err(|e| anyhow::anyhow!("Search failed: {}", e))?;

        Ok(search_result
            .hits
            .into_iter()
            .map(|hit| SimilarityResult {
                document: hit.result,
                score: hit.ranking_score.map(|s| s as f32),
            })
            .collect())
    }
}
