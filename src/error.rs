//! Error types for the proxy.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("{message}")]
    Config { message: String },

    /// The upstream answered with a non-success status.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn upstream(status: u16, msg: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: msg.into(),
        }
    }

    /// HTTP status reported to the caller: the upstream's own status when it
    /// gave one, 500 for everything else.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::Http(e) => e.status().map_or(500, |s| s.as_u16()),
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_passes_through() {
        let err = ProxyError::upstream(429, "rate limited");
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_local_errors_are_500() {
        assert_eq!(ProxyError::config("NVIDIA_API_KEY not configured").status_code(), 500);
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ProxyError::from(json_err).status_code(), 500);
    }
}
