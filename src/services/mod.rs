// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod analytics;
pub mod auth_middleware;
pub mod crawl_orchestrator;
pub mod crawler;
pub mod credentials;
pub mod forwarder;
pub mod logging;
pub mod model_proxy;
pub mod providers;
pub mod search;
pub mod tool_client;
pub mod web_search;
