// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::analytics::{CaptureEvent, CaptureRequest};
use anyhow::{anyhow, Result};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

/// Forwards capture events to a PostHog-compatible `/capture/` endpoint.
pub struct AnalyticsClient {
    client: reqwest::Client,
    host: String,
    api_key: SecretString,
}

impl AnalyticsClient {
    pub fn new(host: &str, api_key: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build the backend event, tagging it with the workspace.
    pub fn event(&self, workspace_id: &str, request: CaptureRequest) -> CaptureEvent {
        let mut properties = request.properties;
        properties.insert(
            "workspace_id".to_string(),
            Value::String(workspace_id.to_string()),
        );

        CaptureEvent {
            api_key: self.api_key.expose_secret().to_string(),
            event: request.event,
            distinct_id: request.unique_id,
            properties,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub async fn capture(&self, workspace_id: &str, request: CaptureRequest) -> Result<()> {
        let event = self.event(workspace_id, request);
        let response = self
            .client
            .post(format!("{}/capture/", self.host))
            .json(&event)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send analytics event: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Analytics backend returned {}", status));
        }

        tracing::debug!(event = %event.event, workspace_id, "Captured analytics event");
        Ok(())
    }
}
