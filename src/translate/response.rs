//! Normalize upstream failures into the caller's error shape.
//!
//! Successful upstream bodies already match what callers expect and are
//! relayed as-is, so only the error direction needs translating.

use super::nim_types::{NimErrorField, NimErrorResponse};
use super::openai_types::ErrorResponse;
use crate::error::ProxyError;

/// Pull the upstream's own error message out of an error body, if it declared one.
#[must_use]
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let parsed: NimErrorResponse = serde_json::from_slice(body).ok()?;

    let from_error = parsed.error.and_then(|e| match e {
        NimErrorField::Text(text) => Some(text),
        NimErrorField::Object { message } => message,
    });

    let from_detail = || {
        parsed.detail.as_ref().and_then(|d| match d {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
    };

    from_error
        .or_else(from_detail)
        .or(parsed.message)
        .or(parsed.title)
        .filter(|m| !m.is_empty())
}

/// Build the error for an upstream non-success response.
#[must_use]
pub fn upstream_error(status: u16, body: &[u8]) -> ProxyError {
    let message = extract_error_message(body)
        .unwrap_or_else(|| format!("Request failed with status code {}", status));
    ProxyError::upstream(status, message)
}

/// Caller-facing status and body for any proxy failure.
#[must_use]
pub fn error_to_openai(err: &ProxyError) -> (u16, ErrorResponse) {
    (err.status_code(), ErrorResponse::proxy_error(err.to_string()))
}
