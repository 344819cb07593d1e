// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Resolves key-location descriptors (`env:NAME`) into provider credentials.

use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;

const ENV_PREFIX: &str = "env:";

/// Why a descriptor did not resolve. Only ever logged, never shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("no key location descriptor supplied")]
    MissingDescriptor,
    #[error("unsupported key location format: {0}")]
    UnsupportedFormat(String),
    #[error("environment variable {0} is not set")]
    VariableNotFound(String),
}

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Maps descriptors to secrets through a variable lookup.
#[derive(Clone)]
pub struct CredentialResolver {
    lookup: Arc<Lookup>,
}

impl CredentialResolver {
    /// Resolver backed by the process environment
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Resolver backed by an arbitrary lookup (tests, embedded configs)
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Resolve a descriptor into a secret value.
    pub fn resolve(&self, descriptor: Option<&str>) -> Result<SecretString, CredentialError> {
        let result = self.resolve_inner(descriptor);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Failed to resolve API key location");
        }
        result
    }

    fn resolve_inner(&self, descriptor: Option<&str>) -> Result<SecretString, CredentialError> {
        let descriptor = descriptor
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(CredentialError::MissingDescriptor)?;

        let name = descriptor
            .strip_prefix(ENV_PREFIX)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CredentialError::UnsupportedFormat(scheme_of(descriptor)))?;

        (self.lookup)(name)
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| CredentialError::VariableNotFound(name.to_string()))
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

/// The part of a descriptor that names its scheme, safe to log.
fn scheme_of(descriptor: &str) -> String {
    match descriptor.split_once(':') {
        Some((scheme, _)) => format!("{}:", scheme),
        None => "<no scheme>".to_string(),
    }
}
