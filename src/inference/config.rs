//! Model backend configuration.
//!
//! The `model:` section of `dbchat.yaml`. Loading and env-var interpolation
//! live in [`crate::config`]; this module only owns the shape, the defaults,
//! and the validation rules.

use std::time::Duration;

use serde::Deserialize;

use super::errors::InferenceError;

fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

/// Upper bound for `max_attempts`.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Connection and sampling settings for the OpenAI-compatible endpoint.
#[derive(Clone, Deserialize)]
pub struct ModelConfig {
    /// Base URL including the API version, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: String,
    /// Bearer token. An empty string is treated as "no key".
    #[serde(default)]
    pub api_key: Option<String>,
    /// Default model, overridable per request.
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Total timeout for one HTTP attempt.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Attempts per completion, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl ModelConfig {
    /// Minimal config pointing at `base_url`, all other fields defaulted.
    pub fn new(base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model_name: model_name.into(),
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// The API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Reject configurations the client cannot work with.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.base_url.trim().is_empty() {
            return Err(InferenceError::ConfigError {
                reason: "model.base_url is empty".into(),
            });
        }
        if self.model_name.trim().is_empty() {
            return Err(InferenceError::ConfigError {
                reason: "model.model_name is empty".into(),
            });
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(InferenceError::ConfigError {
                reason: format!(
                    "model.max_attempts must be within 1..={MAX_ATTEMPTS_LIMIT}, got {}",
                    self.max_attempts
                ),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(InferenceError::ConfigError {
                reason: format!(
                    "model.temperature must be within 0.0..=2.0, got {}",
                    self.temperature
                ),
            });
        }
        Ok(())
    }
}

// Hand-written so the API key never ends up in logs.
impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let yaml = r#"
            base_url: "http://localhost:11434/v1"
            model_name: "qwen2.5:7b"
        "#;
        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(500));
        assert!(config.api_key().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let mut config = ModelConfig::new("http://x/v1", "m");
        config.api_key = Some("   ".into());
        assert!(config.api_key().is_none());
        config.api_key = Some("sk-123".into());
        assert_eq!(config.api_key(), Some("sk-123"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = ModelConfig::new("http://x/v1", "m");
        config.api_key = Some("sk-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = ModelConfig::new("http://x/v1", "m");
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_caps_attempts() {
        let mut config = ModelConfig::new("http://x/v1", "m");
        config.max_attempts = MAX_ATTEMPTS_LIMIT;
        assert!(config.validate().is_ok());
        config.max_attempts = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let config = ModelConfig::new("http://x/v1", "");
        assert!(config.validate().is_err());
    }
}
