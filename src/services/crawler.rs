// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Page fetching and HTML extraction for the crawl orchestrator.

use crate::models::crawler::FetchedPage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// Loads a page and reports its HTML, title and post-redirect URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}

/// Plain HTTP fetcher. Pages needing script execution come back as served.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpPageFetcher {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, user_agent })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url.as_str())
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch content: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Failed to fetch content: HTTP {}", status));
        }

        let final_url = response.url().clone();
        let html = response.text().await?;
        let title = extract_title(&html);

        Ok(FetchedPage {
            html,
            title,
            final_url,
        })
    }
}

/// Extract the page title: `<title>` first, then the first `<h1>`.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        let element = document.select(&selector).next()?;
        let text = normalize_whitespace(&element.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    })
}

/// Visible text of a document, skipping script and style contents.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(content) = node.value().as_text() else {
            continue;
        };
        let inside_code = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if inside_code {
            continue;
        }
        let content = content.trim();
        if !content.is_empty() {
            text.push(' ');
            text.push_str(content);
        }
    }

    normalize_whitespace(&text)
}

/// Absolute http(s) links of a document, resolved against `base`, without
/// fragments, sorted and de-duplicated.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links: Vec<Url> = document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect();

    links.sort();
    links.dedup();
    links
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
