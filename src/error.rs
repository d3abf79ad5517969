//! Error types for history compaction

use crate::context::summarizer::SummarizerError;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CompactionError>;

/// Compaction errors
#[derive(Debug, Error)]
pub enum CompactionError {
    #[error(
        "Invalid configuration: max_summary_tokens ({max_summary_tokens}) must be less than max_tokens ({max_tokens})"
    )]
    InvalidConfiguration {
        max_tokens: usize,
        max_summary_tokens: usize,
    },

    #[error(
        "Budget exceeded: {used} unsummarized tokens reached the {limit} token ceiling. \
        Increase max_tokens or reduce the input size"
    )]
    BudgetExceeded { used: usize, limit: usize },

    #[error("Missing required field `{0}` in the input")]
    MissingField(String),

    #[error("Structured state has no `{0}` field; custom message keys need a JSON state")]
    UnsupportedField(String),

    #[error("Summarizer error: {0}")]
    Summarizer(#[from] SummarizerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl CompactionError {
    /// Whether the error comes from static misuse rather than the input
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CompactionError::InvalidConfiguration { .. }
                | CompactionError::UnsupportedField(_)
                | CompactionError::Config(_)
        )
    }
}
