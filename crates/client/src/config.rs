//! Client configuration (environment-driven).

use std::time::Duration;

use thiserror::Error;

pub const ENV_API_URL: &str = "WARDEN_API_URL";
pub const ENV_API_TOKEN: &str = "WARDEN_API_TOKEN";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "WARDEN_HTTP_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid API URL '{0}': expected an http:// or https:// URL")]
    InvalidBaseUrl(String),

    #[error("invalid WARDEN_HTTP_TIMEOUT_SECS '{0}': expected a positive number of seconds")]
    InvalidTimeout(String),
}

/// Connection settings for the permission backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `WARDEN_API_URL`, `WARDEN_API_TOKEN` and `WARDEN_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_API_URL).unwrap_or_else(|| {
            tracing::warn!("{ENV_API_URL} not set; using dev default {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });

        let mut config = Self::new(base_url)?;

        if let Some(token) = lookup(ENV_API_TOKEN).filter(|t| !t.trim().is_empty()) {
            config.token = Some(token);
        }

        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn normalize_base_url(raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.token, None);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_all_variables() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://lms.example.com/api/"),
            (ENV_API_TOKEN, "secret"),
            (ENV_HTTP_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://lms.example.com/api");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.endpoint("/me/permissions"), "https://lms.example.com/api/me/permissions");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_API_URL, "ftp://x")])),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_HTTP_TIMEOUT_SECS, "0")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_HTTP_TIMEOUT_SECS, "soon")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_API_TOKEN, "  ")])).unwrap();
        assert_eq!(config.token, None);
    }
}
