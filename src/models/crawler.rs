// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// A URL waiting in the crawl frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    /// Link distance from the start URL
    pub depth: u32,
}

/// Limits for one crawl invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget {
    /// Pages deeper than this are never fetched
    pub max_depth: u32,
    /// Upper bound on completed page records
    pub max_requests: usize,
}

/// What the page-fetch capability returns for a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub html: String,
    pub title: Option<String>,
    /// URL after redirects
    pub final_url: Url,
}

/// Per-page crawl outcome. `error` may coexist with partial fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawledPage {
    pub url: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Plain text extracted from the HTML
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_extract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawledPage {
    /// Append an error, keeping any earlier one.
    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error = Some(match self.error.take() {
            Some(existing) => format!("{existing}; {message}"),
            None => message,
        });
    }
}

/// Request body for `POST /crawl`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    /// Where the crawl starts
    pub start_url: String,
    /// Maximum link depth (default: 1)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Maximum number of pages returned (default: 10)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_max_depth() -> u32 {
    1
}

fn default_limit() -> usize {
    10
}

/// One element of the `POST /crawl` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CrawlPageResponse {
    pub url: String,
    pub path: String,
    /// Markdown when conversion succeeded, otherwise the plain-text extract
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<CrawledPage> for CrawlPageResponse {
    fn from(page: CrawledPage) -> Self {
        Self {
            url: page.url,
            path: page.path,
            content: page
                .markdown_content
                .or(page.raw_extract)
                .unwrap_or_default(),
            title: page.title,
            error: page.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_error_concatenates() {
        let mut page = CrawledPage::default();
        page.push_error("markdown conversion failed");
        page.push_error("indexing failed");
        assert_eq!(
            page.error.as_deref(),
            Some("markdown conversion failed; indexing failed")
        );
    }

    #[test]
    fn test_crawl_request_defaults() {
        let request: CrawlRequest =
            serde_json::from_str(r#"{"startUrl": "https://example.com"}"#).unwrap();
        assert_eq!(request.max_depth, 1);
        assert_eq!(request.limit, 10);
    }

    #[test]
    fn test_response_prefers_markdown() {
        let page = CrawledPage {
            url: "https://example.com/a".to_string(),
            path: "/a".to_string(),
            raw_extract: Some("plain".to_string()),
            markdown_content: Some("# A".to_string()),
            ..Default::default()
        };
        assert_eq!(CrawlPageResponse::from(page).content, "# A");
    }

    #[test]
    fn test_response_falls_back_to_extract() {
        let page = CrawledPage {
            url: "https://example.com/a".to_string(),
            path: "/a".to_string(),
            raw_extract: Some("plain".to_string()),
            error: Some("markdown conversion failed".to_string()),
            ..Default::default()
        };
        let response = CrawlPageResponse::from(page);
        assert_eq!(response.content, "plain");
        assert!(response.error.is_some());
    }
}
