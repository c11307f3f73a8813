//! Configuration for the API client.

use crate::client::utils::normalize_base_url;
use crate::error::Result;

/// Environment variable selecting the API base URL.
pub const API_URL_ENV: &str = "LMS_API_URL";

/// Base URL used when [`API_URL_ENV`] is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/";

/// Configuration for the API client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every call-site path is resolved against.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Connection timeout in seconds.
    pub connection_timeout_secs: u64,
    /// Enable request logging.
    pub enable_logging: bool,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: 30000,
            connection_timeout_secs: 30,
            enable_logging: false,
            user_agent: concat!("lms-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults with the base URL taken from [`API_URL_ENV`].
    pub fn from_env() -> Self {
        let base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self {
            base_url,
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Base URL ending in exactly one `/`.
    pub fn normalized_base_url(&self) -> Result<String> {
        normalize_base_url(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000/api/");
        assert_eq!(config.request_timeout_ms, 30000);
        assert_eq!(config.connection_timeout_secs, 30);
        assert!(!config.enable_logging);
        assert!(config.user_agent.starts_with("lms-client/"));
    }

    #[test]
    fn test_partial_override() {
        let config = ClientConfig {
            request_timeout_ms: 1000,
            ..Default::default()
        }
        .with_base_url("http://x/api");
        assert_eq!(config.request_timeout_ms, 1000);
        assert_eq!(config.connection_timeout_secs, 30);
        assert_eq!(config.normalized_base_url().unwrap(), "http://x/api/");
    }

    #[test]
    fn test_from_env_reads_base_url() {
        // Only test touching API_URL_ENV, so there is no cross-test race.
        std::env::set_var(API_URL_ENV, "https://lms.example.com/api");
        let config = ClientConfig::from_env();
        std::env::remove_var(API_URL_ENV);
        assert_eq!(config.base_url, "https://lms.example.com/api");

        let config = ClientConfig::from_env();
        assert_eq!(config.base_url, DEFAULT_API_URL);
    }
}
