//! Caller-facing types for the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//!
//! Only the inbound request and the shapes this proxy produces itself (errors,
//! the fallback model list) are modeled. Successful upstream bodies are relayed
//! as raw bytes and never parsed.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what the caller sends US)
// ---------------------------------------------------------------------------

/// Inbound chat completion request. Values are kept as raw JSON so that a
/// wrongly typed field reaches the upstream as sent and fails there. Every
/// optional field treats JSON `null` the same as absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Forwarded without inspection, whatever its shape.
    pub messages: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<serde_json::Value>,
    /// Accepted for compatibility with OpenAI clients; not sent upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Parse a request body. Only bodies that are not a JSON object or that
    /// have no `messages` key are refused.
    pub fn from_body(body: &[u8]) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("request body must be a JSON object"));
        }
        serde_json::from_value(value)
    }
}

// ---------------------------------------------------------------------------
// Error shape (every failure the proxy answers with)
// ---------------------------------------------------------------------------

pub const PROXY_ERROR_TYPE: &str = "proxy_error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
}

impl ErrorResponse {
    pub fn proxy_error(message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: PROXY_ERROR_TYPE.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Model listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}
