// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Breadth-first crawl over a site with bounded concurrency.
//!
//! Pages come back in fetch-completion order. Per-page failures are recorded
//! on the page itself and never abort the crawl.

use crate::models::crawler::{CrawlBudget, CrawlTask, CrawledPage};
use crate::models::search::IndexedDocument;
use crate::services::crawler::{extract_links, extract_text, PageFetcher};
use crate::services::search::DocumentIndex;
use crate::services::tool_client::MarkdownConverter;
use anyhow::{bail, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use url::Url;

pub const DEFAULT_CONCURRENCY: usize = 5;

pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    converter: Arc<dyn MarkdownConverter>,
    index: Option<Arc<dyn DocumentIndex>>,
    concurrency: usize,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, converter: Arc<dyn MarkdownConverter>) -> Self {
        Self {
            fetcher,
            converter,
            index: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Index every successfully converted page.
    pub fn with_index(mut self, index: Arc<dyn DocumentIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn launch_crawl(&self, start_url: &str, budget: CrawlBudget) -> Result<Vec<CrawledPage>> {
        let mut start = Url::parse(start_url)?;
        if !matches!(start.scheme(), "http" | "https") {
            bail!("unsupported URL scheme '{}'", start.scheme());
        }
        start.set_fragment(None);

        tracing::info!(
            url = %start,
            max_depth = budget.max_depth,
            max_requests = budget.max_requests,
            "Starting crawl"
        );

        // The start host plus wherever the start page redirects to
        let mut hosts: HashSet<String> = start.host_str().map(str::to_string).into_iter().collect();
        let mut seen: HashSet<Url> = HashSet::from([start.clone()]);
        // Final URLs already recorded, shared with in-flight visits
        let claimed: Mutex<HashSet<Url>> = Mutex::default();
        let mut frontier = VecDeque::from([CrawlTask {
            url: start,
            depth: 0,
        }]);
        let mut in_flight = FuturesUnordered::new();
        let mut dispatched = 0;
        let mut pages = Vec::new();

        loop {
            while in_flight.len() < self.concurrency && dispatched < budget.max_requests {
                let Some(task) = frontier.pop_front() else {
                    break;
                };
                if task.depth > budget.max_depth {
                    continue;
                }
                dispatched += 1;
                in_flight.push(self.visit(task, &claimed));
            }

            let Some(visit) = in_flight.next().await else {
                break;
            };
            let depth = visit.task.depth;

            if let Some(final_url) = visit.final_url {
                if depth == 0 {
                    if let Some(host) = final_url.host_str() {
                        hosts.insert(host.to_string());
                    }
                }
                seen.insert(final_url);
            }
            let Some(page) = visit.page else {
                continue;
            };
            pages.push(page);

            if depth >= budget.max_depth || pages.len() >= budget.max_requests {
                continue;
            }
            for link in visit.links {
                if !link.host_str().is_some_and(|host| hosts.contains(host)) {
                    continue;
                }
                if seen.insert(link.clone()) {
                    frontier.push_back(CrawlTask {
                        url: link,
                        depth: depth + 1,
                    });
                }
            }
        }

        tracing::info!(pages = pages.len(), requests = dispatched, "Crawl finished");
        Ok(pages)
    }

    /// Fetch, convert and index one page. The page is recorded under the URL
    /// it resolved to; a page resolving to an already claimed URL yields no
    /// record.
    async fn visit(&self, task: CrawlTask, claimed: &Mutex<HashSet<Url>>) -> Visit {
        let fetched = match self.fetcher.fetch(&task.url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(url = %task.url, error = %e, "Page fetch failed");
                let page = CrawledPage {
                    url: task.url.to_string(),
                    path: task.url.path().to_string(),
                    error: Some(e.to_string()),
                    ..Default::default()
                };
                return Visit {
                    task,
                    page: Some(page),
                    final_url: None,
                    links: Vec::new(),
                };
            }
        };

        let mut final_url = fetched.final_url;
        final_url.set_fragment(None);

        let first = claimed
            .lock()
            .map(|mut claimed| claimed.insert(final_url.clone()))
            .unwrap_or(true);
        if !first {
            tracing::debug!(url = %task.url, final_url = %final_url, "Redirected to a page already crawled");
            return Visit {
                task,
                page: None,
                final_url: Some(final_url),
                links: Vec::new(),
            };
        }

        let mut page = CrawledPage {
            url: final_url.to_string(),
            path: final_url.path().to_string(),
            title: fetched.title,
            raw_extract: Some(extract_text(&fetched.html)),
            ..Default::default()
        };
        let links = extract_links(&fetched.html, &final_url);

        match self.converter.convert(&fetched.html).await {
            Ok(markdown) => {
                if let Some(index) = &self.index {
                    let document = IndexedDocument::new(
                        &page.url,
                        &page.path,
                        page.title.clone(),
                        markdown.clone(),
                    );
                    if let Err(e) = index.add_documents(&[document]).await {
                        tracing::warn!(url = %page.url, error = %e, "Indexing failed");
                        page.push_error(format!("indexing failed: {e}"));
                    }
                }
                page.markdown_content = Some(markdown);
            }
            Err(e) => {
                tracing::warn!(url = %page.url, error = %e, "Markdown conversion failed");
                page.push_error(format!("markdown conversion failed: {e}"));
            }
        }

        Visit {
            task,
            page: Some(page),
            final_url: Some(final_url),
            links,
        }
    }
}

/// Outcome of one page visit.
struct Visit {
    task: CrawlTask,
    /// `None` when the page resolved to a URL another visit already recorded
    page: Option<CrawledPage>,
    /// URL after redirects, when the fetch succeeded
    final_url: Option<Url>,
    links: Vec<Url>,
}
