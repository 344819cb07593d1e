// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Authentication middleware for Axum.
//!
//! Both checks are presence-only:
//! - `require_extension_headers`: the editor extension header set
//! - `require_bearer`: `Authorization: Bearer <token>`

use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Headers every extension request carries. Header names are matched
/// case-insensitively.
pub const EXTENSION_HEADERS: [&str; 6] = ["key", "timestamp", "v", "extensionversion", "os", "uniqueid"];

/// Auth error responses.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingHeader(&'static str),
    MissingBearer,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingHeader(name) => format!("Missing required header: {}", name),
            AuthError::MissingBearer => "Bearer token required".to_string(),
        };
        (StatusCode::UNAUTHORIZED, message).into_response()
    }
}

/// First extension header absent from `headers`, if any.
pub fn missing_extension_header(headers: &HeaderMap) -> Option<&'static str> {
    EXTENSION_HEADERS
        .into_iter()
        .find(|name| !headers.contains_key(*name))
}

/// Non-empty bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn require_extension_headers(request: Request, next: Next) -> Result<Response, AuthError> {
    if let Some(name) = missing_extension_header(request.headers()) {
        tracing::debug!(header = name, "Rejected request without extension header");
        return Err(AuthError::MissingHeader(name));
    }
    Ok(next.run(request).await)
}

pub async fn require_bearer(request: Request, next: Next) -> Result<Response, AuthError> {
    if bearer_token(request.headers()).is_none() {
        tracing::debug!("Rejected request without bearer token");
        return Err(AuthError::MissingBearer);
    }
    Ok(next.run(request).await)
}
