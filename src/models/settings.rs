// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::services::logging::LogFormat;
use clap::{Parser, ValueEnum};
use std::fmt;

/// Which backend answers `/web` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchProviderKind {
    /// Google results through the Serper API
    Serper,
    /// Similarity search over crawled documents in Meilisearch
    Index,
    /// Web search disabled
    None,
}

impl fmt::Display for SearchProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchProviderKind::Serper => "serper",
            SearchProviderKind::Index => "index",
            SearchProviderKind::None => "none",
        };
        f.write_str(name)
    }
}

/// Process configuration. Every flag can also be set through its
/// environment variable.
#[derive(Parser, Clone)]
#[command(name = "calliope-gateway", version = crate::app::VERSION, about)]
pub struct Settings {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "SEARCH_PROVIDER", value_enum, default_value_t = SearchProviderKind::Serper)]
    pub search_provider: SearchProviderKind,

    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    pub serper_api_key: Option<String>,

    #[arg(long, env = "MEILISEARCH_HOST")]
    pub meilisearch_host: Option<String>,

    #[arg(long, env = "MEILISEARCH_API_KEY", hide_env_values = true)]
    pub meilisearch_api_key: Option<String>,

    #[arg(long, env = "MEILISEARCH_INDEX", default_value = "documents")]
    pub meilisearch_index: String,

    /// Remote tool service providing `convert_to_markdown`
    #[arg(long, env = "MARKDOWN_SERVICE_URL")]
    pub markdown_service_url: Option<String>,

    #[arg(long, env = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// In-flight page fetches per crawl
    #[arg(long, env = "CRAWL_CONCURRENCY", default_value_t = 5)]
    pub crawl_concurrency: usize,

    /// Upper bound applied to a crawl request's `limit`
    #[arg(long, env = "CRAWL_MAX_LIMIT", default_value_t = 100)]
    pub crawl_max_limit: usize,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Timeout for buffered (non-streaming) upstream model calls
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    #[arg(long, env = "ANALYTICS_HOST")]
    pub analytics_host: Option<String>,

    #[arg(long, env = "ANALYTICS_API_KEY", hide_env_values = true)]
    pub analytics_api_key: Option<String>,

    /// Include panic details in 500 responses
    #[arg(long, env = "DEV_MODE", default_value_t = false)]
    pub dev_mode: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Settings {
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("CalliopeGateway/{}", crate::app::VERSION))
    }
}

// Hand-written so API keys never reach the logs
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = |secret: &Option<String>| {
            secret
                .as_deref()
                .map(crate::services::logging::mask_secret)
        };
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("search_provider", &self.search_provider)
            .field("serper_api_key", &masked(&self.serper_api_key))
            .field("meilisearch_host", &self.meilisearch_host)
            .field("meilisearch_api_key", &masked(&self.meilisearch_api_key))
            .field("meilisearch_index", &self.meilisearch_index)
            .field("markdown_service_url", &self.markdown_service_url)
            .field("user_agent", &self.user_agent)
            .field("crawl_concurrency", &self.crawl_concurrency)
            .field("crawl_max_limit", &self.crawl_max_limit)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("analytics_host", &self.analytics_host)
            .field("analytics_api_key", &masked(&self.analytics_api_key))
            .field("dev_mode", &self.dev_mode)
            .field("log_format", &self.log_format)
            .finish()
    }
}
