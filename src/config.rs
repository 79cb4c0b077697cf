use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const DEFAULT_MODEL: &str = "meta/llama-3.1-405b-instruct";
pub const DEFAULT_API_KEY_ENV: &str = "NVIDIA_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Credential resolved once at load time. Never written back out.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Total request timeout. Unset means the upstream call runs until it
    /// answers or fails, which long streams rely on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: None,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamConfig::default(),
            log_file: None,
            api_key: None,
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl ProxyConfig {
    /// Config with defaults and the given credential, for embedding and tests.
    pub fn with_upstream(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            upstream: UpstreamConfig {
                base_url: base_url.into(),
                ..UpstreamConfig::default()
            },
            api_key,
            ..Self::default()
        }
    }

    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Build the process configuration: file (explicit or first found on the
    /// search path, optional) then environment overrides.
    /// Priority: env > explicit file > CWD > XDG config > defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::load(path)?,
            None => match config_search_paths().into_iter().find(|p| p.exists()) {
                Some(candidate) => {
                    tracing::info!(path = %candidate.display(), "Loading config");
                    Self::load(&candidate)?
                }
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`, resolving the credential.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("NVIDIA_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.upstream.base_url = url;
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ProxyError::config(format!("Invalid PORT value '{}'", port)))?;
        }
        self.api_key = lookup(self.upstream.api_key_env.as_str()).filter(|v| !v.trim().is_empty());
        Ok(())
    }

    /// The upstream credential, or the configuration error every chat call
    /// must answer with when it is missing.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProxyError::config(format!("{} not configured", self.upstream.api_key_env)))
    }

    /// Join the upstream base URL with `path` using exactly one slash.
    #[must_use]
    pub fn upstream_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.upstream.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Candidate config file locations, in lookup order.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("nim-proxy.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("nim-proxy").join("config.toml"));
    }
    if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
        paths.push(home.join(".config").join("nim-proxy").join("config.toml"));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[upstream]
base_url = "http://localhost:9000/v1"
default_model = "meta/llama-3.1-8b-instruct"
timeout_secs = 120
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upstream.base_url, "http://localhost:9000/v1");
        assert_eq!(config.upstream.default_model, "meta/llama-3.1-8b-instruct");
        assert_eq!(config.upstream.api_key_env, "NVIDIA_API_KEY");
        assert_eq!(config.upstream.timeout_secs, Some(120));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.upstream.default_model, DEFAULT_MODEL);
        assert_eq!(config.upstream.timeout_secs, None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ProxyConfig::default();
        config
            .apply_env(env(&[
                ("NVIDIA_API_KEY", "nvapi-test"),
                ("NVIDIA_BASE_URL", "http://127.0.0.1:8000/v1"),
                ("PORT", "8080"),
            ]))
            .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:8000/v1");
        assert_eq!(config.require_api_key().unwrap(), "nvapi-test");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = ProxyConfig::default();
        assert!(config.apply_env(env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = ProxyConfig::default();
        config.apply_env(env(&[("NVIDIA_API_KEY", "  ")])).unwrap();

        let err = config.require_api_key().unwrap_err();
        assert_eq!(err.to_string(), "NVIDIA_API_KEY not configured");
    }

    #[test]
    fn test_upstream_url_join() {
        let config = ProxyConfig::with_upstream("https://integrate.api.nvidia.com/v1/", None);
        assert_eq!(
            config.upstream_url("/chat/completions"),
            "https://integrate.api.nvidia.com/v1/chat/completions"
        );
        assert_eq!(
            config.upstream_url("models"),
            "https://integrate.api.nvidia.com/v1/models"
        );
    }
}
