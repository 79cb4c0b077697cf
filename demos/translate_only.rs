//! Demonstrate using the translation layer without a server.
//!
//! Usage:
//!   `cargo run --example translate_only`

use nim_proxy::config::DEFAULT_MODEL;
use nim_proxy::translate::openai_types::ChatRequest;
use nim_proxy::translate::request::openai_to_nim;
use nim_proxy::translate::response::{error_to_openai, upstream_error};

fn main() {
    // An OpenAI-style request with most parameters left out
    let req: ChatRequest = serde_json::from_value(serde_json::json!({
        "messages": [
            {"role": "system", "content": "You are a geography expert. Be concise."},
            {"role": "user", "content": "What is the capital of France?"},
            {"role": "assistant", "content": "The capital of France is Paris."},
            {"role": "user", "content": "And Germany?"}
        ],
        "stream": true,
        // accepted, but not part of the NIM payload
        "frequency_penalty": 0.2
    }))
    .expect("valid request");

    let payload = openai_to_nim(&req, DEFAULT_MODEL);

    println!("=== Translated Request (NIM payload) ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).expect("serializable payload")
    );

    // What a caller sees when NIM rejects the request
    let nim_body = br#"{"type":"about:blank","status":402,"title":"Payment Required","detail":"Account credits exhausted"}"#;
    let (status, body) = error_to_openai(&upstream_error(402, nim_body));

    println!();
    println!("=== Normalized Error (HTTP {status}) ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&body).expect("serializable error")
    );
}
