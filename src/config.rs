//! Configuration loading
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. an optional config file (`compactor.toml` unless another path is given)
//! 3. `COMPACTOR__<SECTION>__<KEY>` environment variables, `.env` included

use crate::context::compactor::CompactionSettings;
use crate::context::summarizer::SummarizerConfig;
use crate::context::templates::PromptTemplateSet;
use crate::error::Result;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const ENV_PREFIX: &str = "COMPACTOR";
const DEFAULT_CONFIG_FILE: &str = "compactor";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compaction: CompactionSettings,

    #[serde(default)]
    pub summarizer: SummarizerSettings,

    #[serde(default)]
    pub templates: PromptTemplateSet,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from `.env`, an optional config file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }

        let config: Config = config::Config::builder()
            .add_source(config::File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse an embedded TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.compaction.validate()
    }
}

/// Summarizer endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizerSettings {
    /// Chat-completions URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// HTTP attempts per summary
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    1
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            temperature: None,
        }
    }
}

impl SummarizerSettings {
    /// Build the client configuration, reading the API key from the environment
    pub fn to_summarizer_config(&self) -> SummarizerConfig {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .map(SecretString::new);

        SummarizerConfig {
            endpoint: self.endpoint.clone(),
            api_key,
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
            temperature: self.temperature,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compaction.max_tokens, 4096);
        assert_eq!(config.summarizer.max_attempts, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_toml_str() {
        let config = Config::from_toml_str(
            r#"
            [compaction]
            max_tokens = 6
            max_summary_tokens = 0

            [summarizer]
            model = "local-model"
            api_key_env = "HISTORY_COMPACTOR_TEST_UNSET_KEY"

            [templates]
            summary_message = "Earlier: {summary}"

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.compaction, CompactionSettings::new(6, 0));
        assert_eq!(config.summarizer.model, "local-model");
        assert_eq!(config.summarizer.timeout_secs, 30);
        assert_eq!(config.templates.summary_message, "Earlier: {summary}");
        assert_eq!(
            config.templates.initial_instruction,
            PromptTemplateSet::default().initial_instruction
        );
        assert!(config.logging.json);

        let client = config.summarizer.to_summarizer_config();
        assert!(client.api_key.is_none());
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_budget_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [compaction]
            max_tokens = 100
            max_summary_tokens = 100
            "#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
