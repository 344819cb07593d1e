// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod analytics;
pub mod crawler;
pub mod model_id;
pub mod proxy;
pub mod search;
pub mod settings;
pub mod version;
