//! Conversation history compaction
//!
//! This module folds older conversation turns into a rolling summary so that
//! the history sent to a model stays within a token budget.

pub mod adapter;
pub mod compactor;
pub mod locks;
pub mod models;
pub mod summarizer;
pub mod templates;
pub mod token_counter;

pub use adapter::{ConversationState, StepContext, StepUpdate, SummarizationStep, SUMMARY_INFO_KEY};
pub use compactor::{CompactionSettings, HistoryCompactor};
pub use locks::ConversationLocks;
pub use models::{CompactionResult, Message, Role, SummaryState, ToolCall};
pub use summarizer::{ConcatenationSummarizer, LLMSummarizer, Summarizer, SummarizerConfig, SummarizerError};
pub use templates::{PromptTemplateSet, PromptTemplates};
pub use token_counter::{MessageCountCounter, TiktokenCounter, TokenCounter, WordBasedCounter};
