//! HTTP client construction and fetch errors
//!
//! One identifying user agent, one overall timeout, redirects followed.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Identifying user agent sent with every static fetch
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; UniversalQuoteScraper/1.0; +https://example.com/bot)";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Static fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent header value
    pub user_agent: String,
    /// Overall request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_redirects: 10,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-URL fetch failures. Recovered by the caller; never abort a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classify a reqwest error, mapping timeouts to [`FetchError::Timeout`]
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Create the shared static-fetch client
pub fn create_http_client(config: &FetchConfig) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert!(config.user_agent.contains("UniversalQuoteScraper"));
        assert_eq!(config.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_create_client() {
        assert!(create_http_client(&FetchConfig::default()).is_ok());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(FetchError::Status(404).to_string(), "HTTP status 404");
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(20)).to_string(),
            "Timeout after 20s"
        );
    }
}
