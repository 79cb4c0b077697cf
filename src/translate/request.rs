//! Translate inbound OpenAI-shaped chat requests into NVIDIA NIM payloads.
//!
//! Each optional parameter is defaulted on its own, and only when absent.
//! Values are moved across untouched, whatever their type: validating them is
//! the upstream's job.

use super::nim_types::UpstreamPayload;
use super::openai_types::ChatRequest;
use serde_json::Value;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u64 = 1024;
pub const DEFAULT_TOP_P: f64 = 1.0;

fn or_default(value: &Option<Value>, default: impl Into<Value>) -> Value {
    value.clone().unwrap_or_else(|| default.into())
}

/// Translate a chat request into the upstream payload.
/// Pure function: the same request and default model always give the same payload.
pub fn openai_to_nim(req: &ChatRequest, default_model: &str) -> UpstreamPayload {
    UpstreamPayload {
        model: or_default(&req.model, default_model),
        messages: req.messages.clone(),
        temperature: or_default(&req.temperature, DEFAULT_TEMPERATURE),
        max_tokens: or_default(&req.max_tokens, DEFAULT_MAX_TOKENS),
        stream: or_default(&req.stream, false),
        top_p: or_default(&req.top_p, DEFAULT_TOP_P),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MODEL;
    use serde_json::json;

    fn request(body: serde_json::Value) -> ChatRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let req = request(json!({"messages": [{"role": "user", "content": "Hello"}]}));
        let payload = openai_to_nim(&req, DEFAULT_MODEL);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "model": "meta/llama-3.1-405b-instruct",
                "messages": [{"role": "user", "content": "Hello"}],
                "temperature": 0.7,
                "max_tokens": 1024,
                "stream": false,
                "top_p": 1.0
            })
        );
        assert!(!payload.is_streaming());
    }

    #[test]
    fn test_explicit_values_kept() {
        let req = request(json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "model": "meta/llama-3.1-8b-instruct",
            "temperature": 0.0,
            "max_tokens": 16,
            "top_p": 0.5,
            "stream": true
        }));
        let payload = openai_to_nim(&req, DEFAULT_MODEL);

        assert_eq!(payload.model, json!("meta/llama-3.1-8b-instruct"));
        assert_eq!(payload.temperature, json!(0.0));
        assert_eq!(payload.max_tokens, json!(16));
        assert_eq!(payload.top_p, json!(0.5));
        assert!(payload.is_streaming());
    }

    #[test]
    fn test_defaults_are_independent() {
        let req = request(json!({"messages": [], "max_tokens": 10}));
        let payload = openai_to_nim(&req, "some/model");

        assert_eq!(payload.model_name(), "some/model");
        assert_eq!(payload.max_tokens, json!(10));
        assert_eq!(payload.temperature, json!(0.7));
        assert_eq!(payload.top_p, json!(1.0));
    }

    #[test]
    fn test_messages_pass_through_unchanged() {
        let messages = json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": [{"type": "text", "text": "hi"}]},
            {"role": "assistant", "content": null, "extra": {"kept": true}},
            {"not_a_role": 5}
        ]);
        let req = request(json!({ "messages": messages.clone() }));
        let payload = openai_to_nim(&req, DEFAULT_MODEL);

        assert_eq!(payload.messages, messages);
    }

    #[test]
    fn test_mistyped_values_forwarded() {
        let req = request(json!({
            "messages": "hello",
            "temperature": "hot",
            "max_tokens": 1.5,
            "stream": "yes"
        }));
        let payload = openai_to_nim(&req, DEFAULT_MODEL);

        assert_eq!(payload.messages, json!("hello"));
        assert_eq!(payload.temperature, json!("hot"));
        assert_eq!(payload.max_tokens, json!(1.5));
        assert_eq!(payload.stream, json!("yes"));
        assert!(!payload.is_streaming());
    }

    #[test]
    fn test_penalties_not_forwarded() {
        let req = request(json!({"messages": [], "frequency_penalty": 0.3, "presence_penalty": -0.2}));
        let payload = serde_json::to_value(openai_to_nim(&req, "m")).unwrap();

        assert!(payload.get("frequency_penalty").is_none());
        assert!(payload.get("presence_penalty").is_none());
        assert_eq!(payload.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_translation_is_idempotent() {
        let req = request(json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "temperature": 0.2
        }));
        let first = serde_json::to_vec(&openai_to_nim(&req, DEFAULT_MODEL)).unwrap();
        let second = serde_json::to_vec(&openai_to_nim(&req, DEFAULT_MODEL)).unwrap();
        assert_eq!(first, second);
    }
}
