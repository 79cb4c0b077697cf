//! Model listing: the upstream's own `/models` answer when it can be had,
//! otherwise a static list of NVIDIA-hosted models.

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::translate::openai_types::{ModelList, ModelObject};
use crate::translate::response::upstream_error;
use bytes::Bytes;

/// Models served when the upstream list is unavailable.
pub const FALLBACK_MODEL_IDS: &[&str] = &[
    "meta/llama-3.1-405b-instruct",
    "meta/llama-3.1-70b-instruct",
    "meta/llama-3.1-8b-instruct",
    "meta/llama-3.3-70b-instruct",
    "nvidia/llama-3.1-nemotron-70b-instruct",
    "mistralai/mixtral-8x22b-instruct-v0.1",
    "mistralai/mistral-large-2-instruct",
    "google/gemma-2-27b-it",
    "microsoft/phi-3-medium-128k-instruct",
    "deepseek-ai/deepseek-r1",
    "qwen/qwen2.5-coder-32b-instruct",
];

/// Where a model listing came from.
#[derive(Debug, Clone)]
pub enum ModelsReply {
    /// The upstream's JSON body, byte for byte.
    Upstream(Bytes),
    Fallback(ModelList),
}

/// Fetch the model list from the configured upstream.
///
/// # Errors
/// Returns `ProxyError::Config` without a credential, `ProxyError::Upstream`
/// on a non-2xx answer, and `ProxyError::Json` when the body is not JSON.
pub async fn fetch_upstream_models(config: &ProxyConfig, client: &reqwest::Client) -> Result<Bytes> {
    let api_key = config.require_api_key()?;
    let url = config.upstream_url("models");

    let response = client
        .get(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .send()
        .await?;

    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(upstream_error(status.as_u16(), &body));
    }

    serde_json::from_slice::<serde_json::Value>(&body)?;
    Ok(body)
}

/// Static model list. The configured default model is always included.
#[must_use]
pub fn fallback_models(default_model: &str) -> ModelList {
    let created = chrono::Utc::now().timestamp();

    let mut ids: Vec<&str> = FALLBACK_MODEL_IDS.to_vec();
    if !ids.contains(&default_model) {
        ids.insert(0, default_model);
    }

    ModelList {
        object: "list".to_string(),
        data: ids
            .into_iter()
            .map(|id| ModelObject {
                id: id.to_string(),
                object: "model".to_string(),
                created,
                owned_by: "nvidia".to_string(),
            })
            .collect(),
    }
}

/// Prefer the live list; any failure falls back to the static one.
pub async fn list_models(config: &ProxyConfig, client: &reqwest::Client) -> ModelsReply {
    match fetch_upstream_models(config, client).await {
        Ok(body) => ModelsReply::Upstream(body),
        Err(e) => {
            if matches!(e, ProxyError::Config { .. }) {
                tracing::debug!(error = %e, "no credential, serving fallback models");
            } else {
                tracing::warn!(error = %e, "fetching upstream models failed, serving fallback");
            }
            ModelsReply::Fallback(fallback_models(&config.upstream.default_model))
        }
    }
}
