//! Token counting for message sequences

use super::models::Message;
use crate::error::{CompactionError, Result};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Maps a sequence of messages to a token cost
pub trait TokenCounter: Send + Sync {
    /// Count the tokens of the given messages
    fn count(&self, messages: &[Message]) -> usize;

    /// Count a single message
    fn count_one(&self, message: &Message) -> usize {
        self.count(std::slice::from_ref(message))
    }
}

impl<F> TokenCounter for F
where
    F: Fn(&[Message]) -> usize + Send + Sync,
{
    fn count(&self, messages: &[Message]) -> usize {
        self(messages)
    }
}

/// Counts every message as one token
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCountCounter;

impl TokenCounter for MessageCountCounter {
    fn count(&self, messages: &[Message]) -> usize {
        messages.len()
    }
}

/// Tiktoken-based counter using cl100k_base (GPT-4, GPT-3.5-turbo)
pub struct TiktokenCounter {
    bpe: Arc<CoreBPE>,
    tokens_per_message: usize,
}

impl TiktokenCounter {
    /// Create a new tiktoken counter with cl100k_base encoding
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| CompactionError::Tokenizer(e.to_string()))?;
        Ok(Self {
            bpe: Arc::new(bpe),
            tokens_per_message: 3,
        })
    }

    /// Framing tokens charged per message on top of its text
    pub fn with_tokens_per_message(mut self, tokens: usize) -> Self {
        self.tokens_per_message = tokens;
        self
    }

    fn encode_len(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| {
                let calls: usize = m
                    .tool_calls
                    .iter()
                    .map(|c| self.encode_len(&c.name) + self.encode_len(&c.arguments.to_string()))
                    .sum();
                self.tokens_per_message + self.encode_len(&m.content) + calls
            })
            .sum()
    }
}

/// Word-based counter (fallback, ~1.3 tokens per word)
#[derive(Debug, Clone)]
pub struct WordBasedCounter {
    tokens_per_word: f64,
    tokens_per_message: usize,
}

impl WordBasedCounter {
    pub fn new(tokens_per_word: f64, tokens_per_message: usize) -> Self {
        Self {
            tokens_per_word,
            tokens_per_message,
        }
    }
}

impl Default for WordBasedCounter {
    fn default() -> Self {
        Self::new(1.3, 3)
    }
}

impl TokenCounter for WordBasedCounter {
    fn count(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| {
                let words = m.content.split_whitespace().count();
                self.tokens_per_message + (words as f64 * self.tokens_per_word).ceil() as usize
            })
            .sum()
    }
}
