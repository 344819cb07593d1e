// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Client for remote tool services spoken to over MCP.
//!
//! A connection tries streamable HTTP first and falls back to SSE once.
//! Connections are shared per service URL through [`ToolClientRegistry`].

use crate::app::VERSION;
use anyhow::Result;
use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, ClientInfo, Implementation};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::{SseClientTransport, StreamableHttpClientTransport};
use rmcp::ServiceExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

type Connection = RunningService<RoleClient, ClientInfo>;

/// Tool name of the HTML to Markdown conversion.
pub const CONVERT_TO_MARKDOWN: &str = "convert_to_markdown";

#[derive(Debug, Error)]
pub enum ToolClientError {
    #[error("failed to connect to {url}: streamable HTTP: {primary}; SSE: {fallback}")]
    Connect {
        url: String,
        primary: String,
        fallback: String,
    },
    #[error("tool '{tool}' call failed: {message}")]
    Call { tool: String, message: String },
    #[error("tool '{tool}' reported an error: {message}")]
    ToolFailed { tool: String, message: String },
}

/// One lazily connected tool service.
pub struct ToolClient {
    url: String,
    connection: RwLock<Option<Arc<Connection>>>,
    /// Serializes connection attempts so concurrent callers share one handshake
    connecting: Mutex<()>,
}

impl ToolClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: RwLock::new(None),
            connecting: Mutex::new(()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Connect if not connected yet.
    pub async fn connect(&self) -> Result<(), ToolClientError> {
        self.connection().await.map(|_| ())
    }

    /// Call a tool, connecting first when needed. The result is the tool's
    /// JSON payload (`structuredContent` when present, otherwise its text).
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value, ToolClientError> {
        let connection = self.connection().await?;

        let result = connection
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                // Force a fresh handshake on the next call
                self.connection.write().await.take();
                return Err(ToolClientError::Call {
                    tool: name.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let result = serde_json::to_value(&result).map_err(|e| ToolClientError::Call {
            tool: name.to_string(),
            message: e.to_string(),
        })?;
        tool_payload(name, &result)
    }

    async fn connection(&self) -> Result<Arc<Connection>, ToolClientError> {
        if let Some(connection) = self.connection.read().await.as_ref() {
            return Ok(connection.clone());
        }

        let _guard = self.connecting.lock().await;
        // Another caller may have connected while we waited
        if let Some(connection) = self.connection.read().await.as_ref() {
            return Ok(connection.clone());
        }

        let connection = Arc::new(self.open().await?);
        *self.connection.write().await = Some(connection.clone());
        Ok(connection)
    }

    async fn open(&self) -> Result<Connection, ToolClientError> {
        let primary = match client_info()
            .serve(StreamableHttpClientTransport::from_uri(self.url.clone()))
            .await
        {
            Ok(connection) => {
                tracing::info!(url = %self.url, "Connected to tool service over streamable HTTP");
                return Ok(connection);
            }
            Err(e) => e.to_string(),
        };

        tracing::warn!(
            url = %self.url,
            error = %primary,
            "Streamable HTTP connection failed, falling back to SSE"
        );

        let fallback = match SseClientTransport::start(self.url.clone()).await {
            Ok(transport) => match client_info().serve(transport).await {
                Ok(connection) => {
                    tracing::info!(url = %self.url, "Connected to tool service over SSE");
                    return Ok(connection);
                }
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };

        Err(ToolClientError::Connect {
            url: self.url.clone(),
            primary,
            fallback,
        })
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        client_info: Implementation {
            name: "calliope-gateway".to_string(),
            version: VERSION.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Pull the useful payload out of a serialized `CallToolResult`.
fn tool_payload(tool: &str, result: &Value) -> Result<Value, ToolClientError> {
    let text: String = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return Err(ToolClientError::ToolFailed {
            tool: tool.to_string(),
            message: text,
        });
    }

    Ok(match result.get("structuredContent") {
        Some(structured) if !structured.is_null() => structured.clone(),
        _ => Value::String(text),
    })
}

/// Shared connections keyed by service URL. Built once at startup and handed
/// to whatever needs a tool service.
#[derive(Default)]
pub struct ToolClientRegistry {
    clients: Mutex<HashMap<String, Arc<ToolClient>>>,
}

impl ToolClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client for `url`, created on first use.
    pub async fn client(&self, url: &str) -> Arc<ToolClient> {
        let mut clients = self.clients.lock().await;
        clients
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(ToolClient::new(url)))
            .clone()
    }
}

/// Converts HTML to Markdown.
#[async_trait]
pub trait MarkdownConverter: Send + Sync {
    async fn convert(&self, html: &str) -> Result<String>;
}

/// Markdown conversion through a remote `convert_to_markdown` tool.
pub struct RemoteMarkdownConverter {
    client: Arc<ToolClient>,
}

impl RemoteMarkdownConverter {
    pub fn new(client: Arc<ToolClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MarkdownConverter for RemoteMarkdownConverter {
    async fn convert(&self, html: &str) -> Result<String> {
        let mut arguments = Map::new();
        arguments.insert("html".to_string(), json!(html));

        match self.client.call_tool(CONVERT_TO_MARKDOWN, arguments).await? {
            Value::String(markdown) => Ok(markdown),
            Value::Object(object) => object
                .get("markdown")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("markdown tool returned no 'markdown' field")),
            other => Err(anyhow::anyhow!("unexpected markdown tool result: {}", other)),
        }
    }
}
