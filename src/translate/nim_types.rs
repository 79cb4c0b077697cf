//! Type definitions for the NVIDIA NIM chat completions endpoint.
//!
//! `UpstreamPayload` is what we send; `NimErrorResponse` covers the error
//! bodies NIM (and the gateways in front of it) are known to return.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what we send TO the upstream)
// ---------------------------------------------------------------------------

/// Outbound payload. Every field is always set: the caller's value when it
/// gave one (of whatever JSON type), the default otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamPayload {
    pub model: serde_json::Value,
    pub messages: serde_json::Value,
    pub temperature: serde_json::Value,
    pub max_tokens: serde_json::Value,
    pub stream: serde_json::Value,
    pub top_p: serde_json::Value,
}

impl UpstreamPayload {
    /// Only a literal `true` asks for an event stream.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream.as_bool().unwrap_or(false)
    }

    /// Model name for logs.
    #[must_use]
    pub fn model_name(&self) -> String {
        match &self.model {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types (what the upstream sends back on failure)
// ---------------------------------------------------------------------------

/// Every field is optional: NIM uses `detail`, OpenAI-style gateways use
/// `error.message`, others put a bare string in `error` or `message`.
#[derive(Debug, Clone, Deserialize)]
pub struct NimErrorResponse {
    #[serde(default)]
    pub error: Option<NimErrorField>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NimErrorField {
    Text(String),
    Object {
        #[serde(default)]
        message: Option<String>,
    },
}
