// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Crawled page as stored in the similarity index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Unique document ID (md5 of the URL)
    pub id: String,
    /// The URL of the document
    pub url: String,
    /// Path component of the URL
    pub path: String,
    /// The title/heading extracted from the document
    pub title: Option<String>,
    /// Markdown content of the page (searchable)
    pub content: String,
    /// First 500 characters of content for preview
    pub excerpt: String,
}

impl IndexedDocument {
    const EXCERPT_CHARS: usize = 500;

    pub fn new(url: &str, path: &str, title: Option<String>, content: String) -> Self {
        let excerpt = if content.chars().count() > Self::EXCERPT_CHARS {
            let cut: String = content.chars().take(Self::EXCERPT_CHARS).collect();
            format!("{}...", cut)
        } else {
            content.clone()
        };

        Self {
            id: format!("{:x}", md5::compute(url.as_bytes())),
            url: url.to_string(),
            path: path.to_string(),
            title,
            content,
            excerpt,
        }
    }
}

/// Search hit with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub document: IndexedDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A unit of retrieved context handed back to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContextItem {
    pub name: String,
    pub description: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Request body for `POST /web`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebSearchRequest {
    /// Search query string
    pub query: String,
    /// Maximum number of results (default: 5, at most 20)
    #[serde(default)]
    pub n: Option<usize>,
}
