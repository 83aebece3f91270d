//! Client configuration.
//!
//! The configuration is fixed once a client is built: base URL, API key, and
//! whether progress is logged through `tracing`.

use std::fmt;

use crate::error::ConfigError;

/// Base URL used when `FLOOM_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:4050";

/// Domain of the hosted Floom service, which always requires an API key.
pub const HOSTED_SERVICE_DOMAIN: &str = "pipeline.floom.ai";

pub const ENV_URL: &str = "FLOOM_URL";
pub const ENV_API_KEY: &str = "FLOOM_API_KEY";
pub const ENV_VERBOSE: &str = "FLOOM_VERBOSE";

#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    api_key: String,
    verbose_debugging: bool,
}

impl ClientConfig {
    /// Trailing slashes on `base_url` are stripped.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            verbose_debugging: false,
        }
    }

    /// Read `FLOOM_URL`, `FLOOM_API_KEY` and `FLOOM_VERBOSE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(ENV_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = lookup(ENV_API_KEY).unwrap_or_default();
        let verbose = match lookup(ENV_VERBOSE) {
            Some(value) => parse_flag(ENV_VERBOSE, &value)?,
            None => false,
        };
        Ok(Self::new(&base_url, &api_key).with_verbose_debugging(verbose))
    }

    pub fn with_verbose_debugging(mut self, verbose: bool) -> Self {
        self.verbose_debugging = verbose;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn verbose_debugging(&self) -> bool {
        self.verbose_debugging
    }

    /// True when the URL targets the hosted service without an API key.
    pub fn missing_required_api_key(&self) -> bool {
        self.base_url.contains(HOSTED_SERVICE_DOMAIN) && self.api_key.is_empty()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("verbose_debugging", &self.verbose_debugging)
            .finish()
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::new("http://localhost:4050//", "");
        assert_eq!(config.base_url(), "http://localhost:4050");
    }

    #[test]
    fn defaults_without_environment() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.api_key(), "");
        assert!(!config.verbose_debugging());
    }

    #[test]
    fn reads_all_variables() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_URL, "https://pipeline.floom.ai/"),
            (ENV_API_KEY, "secret"),
            (ENV_VERBOSE, "Yes"),
        ]))
        .unwrap();
        assert_eq!(config.base_url(), "https://pipeline.floom.ai");
        assert_eq!(config.api_key(), "secret");
        assert!(config.verbose_debugging());
    }

    #[test]
    fn rejects_unparseable_flag() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_VERBOSE, "loud")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_VERBOSE,
                value: "loud".to_string()
            }
        );
    }

    #[test]
    fn hosted_service_requires_key() {
        assert!(ClientConfig::new("https://pipeline.floom.ai", "").missing_required_api_key());
        assert!(!ClientConfig::new("https://pipeline.floom.ai", "k").missing_required_api_key());
        assert!(!ClientConfig::new("http://localhost:4050", "").missing_required_api_key());
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", ClientConfig::new("http://localhost:4050", "hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
