//! Client configuration.
//!
//! The API root and the upload endpoint live on different hosts, so both are
//! configurable independently. `from_env` lets the CLI be pointed at a
//! mock server without flags.

use std::time::Duration;

use crate::error::{ApiError, Result};

pub const DEFAULT_API_URL: &str = "https://api.telegra.ph";
pub const DEFAULT_UPLOAD_URL: &str = "https://telegra.ph/upload";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_URL: &str = "TELEGRAPH_API_URL";
pub const ENV_UPLOAD_URL: &str = "TELEGRAPH_UPLOAD_URL";
pub const ENV_TIMEOUT_SECS: &str = "TELEGRAPH_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_url: String,
    upload_url: String,
    timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `TELEGRAPH_API_URL`, `TELEGRAPH_UPLOAD_URL` and
    /// `TELEGRAPH_TIMEOUT_SECS` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL) {
            config = config.with_api_url(&url);
        }
        if let Some(url) = lookup(ENV_UPLOAD_URL) {
            config = config.with_upload_url(&url);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ApiError::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"))
            })?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_upload_url(mut self, upload_url: &str) -> Self {
        self.upload_url = upload_url.to_string();
        self
    }

    /// `None` leaves the round-trip unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Target URL for an API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_telegraph() {
        let config = ClientConfig::default();
        assert_eq!(config.method_url("getPage"), "https://api.telegra.ph/getPage");
        assert_eq!(config.upload_url(), "https://telegra.ph/upload");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::default().with_api_url("http://localhost:3000/");
        assert_eq!(config.method_url("createAccount"), "http://localhost:3000/createAccount");
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "http://127.0.0.1:9000/"),
            (ENV_UPLOAD_URL, "http://127.0.0.1:9000/upload"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_url(), "http://127.0.0.1:9000");
        assert_eq!(config.upload_url(), "http://127.0.0.1:9000/upload");
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "0")])).unwrap();
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn bad_timeout_is_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn missing_env_keeps_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }
}
