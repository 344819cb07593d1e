// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Compound model identifiers: `{owner}/{package}/{provider}/{model}`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of `/`-separated segments in a compound model identifier.
const SEGMENT_COUNT: usize = 4;

/// Why a compound model string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelIdError {
    #[error("expected 4 '/'-separated segments (owner/package/provider/model), got {0}")]
    InvalidFormat(usize),
    #[error("segment '{0}' must not be empty")]
    EmptySegment(&'static str),
}

/// A routed model: who owns it, which package configures it, which provider
/// serves it and the bare model name that provider expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIdentifier {
    pub owner_slug: String,
    pub package_slug: String,
    pub provider: String,
    pub model_name: String,
}

impl ModelIdentifier {
    /// Parse a compound identifier. Segments cannot themselves contain `/`.
    pub fn parse(model: &str) -> Result<Self, ModelIdError> {
        let segments: Vec<&str> = model.split('/').collect();
        if segments.len() != SEGMENT_COUNT {
            return Err(ModelIdError::InvalidFormat(segments.len()));
        }

        const NAMES: [&str; SEGMENT_COUNT] = ["owner", "package", "provider", "model"];
        if let Some(index) = segments.iter().position(|s| s.is_empty()) {
            return Err(ModelIdError::EmptySegment(NAMES[index]));
        }

        Ok(Self {
            owner_slug: segments[0].to_string(),
            package_slug: segments[1].to_string(),
            provider: segments[2].to_string(),
            model_name: segments[3].to_string(),
        })
    }
}

impl FromStr for ModelIdentifier {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.owner_slug, self.package_slug, self.provider, self.model_name
        )
    }
}
