//! Reasoning-service configuration.

use serde::{Deserialize, Serialize};

use super::controls::RetryPolicy;
use super::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_MODEL: &str = "WEBJUDGE_MODEL";
pub const ENV_BASE_URL: &str = "WEBJUDGE_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "WEBJUDGE_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "WEBJUDGE_MAX_RETRIES";
pub const ENV_BACKOFF_MS: &str = "WEBJUDGE_BACKOFF_MS";
pub const ENV_JITTER_MS: &str = "WEBJUDGE_JITTER_MS";

/// Connection settings for the reasoning service.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningConfig {
    /// Base URL of the generative-language API.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ReasoningConfig {
    /// Config for the default endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create config from a variable source, usually the process environment.
    ///
    /// `GOOGLE_API_KEY` is required; everything else falls back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingVar(ENV_API_KEY))?;

        let mut config = Self::new(api_key);
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var(&lookup, ENV_TIMEOUT_SECS)? {
            config.timeout_secs = secs;
        }
        if let Some(retries) = parse_var(&lookup, ENV_MAX_RETRIES)? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = parse_var(&lookup, ENV_BACKOFF_MS)? {
            config.retry.backoff_base_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, ENV_JITTER_MS)? {
            config.retry.max_jitter_ms = ms;
        }

        tracing::info!(
            model = %config.model,
            base_url = %config.base_url,
            max_retries = config.retry.max_retries,
            "reasoning service configured"
        );
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
