//! Capabilities the executor consults on every call.

use std::collections::HashMap;

use crate::config::{BasicAuthConfig, ClientConfig};
use crate::params::ParamMap;
use crate::transport::TransportRequest;

/// Resolves the base URL of an API, keyed by trait name. An empty string
/// means "not configured".
pub trait BaseUrlProvider: Send + Sync {
    fn base_url(&self, api: &str) -> String;
}

impl<F> BaseUrlProvider for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn base_url(&self, api: &str) -> String {
        self(api)
    }
}

/// One base URL for every API.
#[derive(Debug, Clone)]
pub struct StaticBaseUrl(pub String);

impl BaseUrlProvider for StaticBaseUrl {
    fn base_url(&self, _api: &str) -> String {
        self.0.clone()
    }
}

/// Base URLs taken from a [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBaseUrls {
    default: Option<String>,
    per_api: HashMap<String, String>,
}

impl ConfigBaseUrls {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            default: config.default_base_url.clone(),
            per_api: config.base_urls.clone(),
        }
    }
}

impl BaseUrlProvider for ConfigBaseUrls {
    fn base_url(&self, api: &str) -> String {
        self.per_api
            .get(api)
            .or(self.default.as_ref())
            .cloned()
            .unwrap_or_default()
    }
}

/// Last chance to mutate a request before it is logged and dispatched,
/// typically to add a signature header or parameter.
pub trait SignProvider: Send + Sync {
    fn sign(&self, params: &ParamMap, request: &mut TransportRequest);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSign;

impl SignProvider for NoSign {
    fn sign(&self, _params: &ParamMap, _request: &mut TransportRequest) {}
}

pub trait BasicAuthProvider: Send + Sync {
    fn username(&self) -> String;
    fn password(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl From<&BasicAuthConfig> for BasicAuth {
    fn from(config: &BasicAuthConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }
}

impl BasicAuthProvider for BasicAuth {
    fn username(&self) -> String {
        self.username.clone()
    }

    fn password(&self) -> String {
        self.password.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_base_urls_fall_back_to_default() {
        let config = ClientConfig::from_toml_str(
            r#"
            default_base_url = "http://fallback"
            [base_urls]
            UserApi = "http://users"
            "#,
        )
        .unwrap();
        let provider = ConfigBaseUrls::from_config(&config);
        assert_eq!(provider.base_url("UserApi"), "http://users");
        assert_eq!(provider.base_url("OrderApi"), "http://fallback");
        assert_eq!(ConfigBaseUrls::default().base_url("UserApi"), "");
    }

    #[test]
    fn test_closure_is_a_provider() {
        let provider = |api: &str| format!("http://{}.svc", api.to_lowercase());
        assert_eq!(provider.base_url("UserApi"), "http://userapi.svc");
    }
}
