//! TOML configuration for executors built with [`crate::Executor::from_config`].
//!
//! ```toml
//! default_base_url = "http://localhost:8080"
//!
//! [base_urls]
//! UserApi = "http://users.internal:9000"
//!
//! [basic_auth]
//! username = "svc"
//! password = "secret"
//!
//! [transport]
//! timeout_ms = 5000
//! worker_threads = 4
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Used for every API without an entry in `base_urls`.
    pub default_base_url: Option<String>,
    /// Base URL per API, keyed by the trait name.
    pub base_urls: HashMap<String, String>,
    pub basic_auth: Option<BasicAuthConfig>,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_ms: Option<u64>,
    pub worker_threads: Option<usize>,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("invalid client config: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Base URL for `api`, falling back to `default_base_url`.
    pub fn base_url_for(&self, api: &str) -> Option<&str> {
        self.base_urls
            .get(api)
            .or(self.default_base_url.as_ref())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_config() {
        let config = ClientConfig::from_toml_str(
            r#"
            default_base_url = "http://localhost:8080"

            [base_urls]
            UserApi = "http://users:9000"

            [basic_auth]
            username = "svc"
            password = "secret"

            [transport]
            timeout_ms = 1500
            worker_threads = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url_for("UserApi"), Some("http://users:9000"));
        assert_eq!(config.base_url_for("OrderApi"), Some("http://localhost:8080"));
        assert_eq!(config.basic_auth.unwrap().username, "svc");
        assert_eq!(config.transport.timeout_ms, Some(1500));
        assert_eq!(config.transport.worker_threads, Some(2));
        assert!(config.transport.user_agent.is_none());
    }

    #[test]
    fn test_empty_config_has_no_base_url() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config.base_url_for("UserApi"), None);
    }

    #[test]
    fn test_malformed_config_is_a_configuration_error() {
        let err = ClientConfig::from_toml_str("base_urls = 3").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
