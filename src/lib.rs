//! Token-budgeted conversation history compaction
//!
//! [`HistoryCompactor`] keeps the history sent to a language model within a
//! token budget by folding the oldest turns into a rolling summary, and
//! [`SummarizationStep`] runs it as one step of a stateful agent pipeline.
//!
//! ```no_run
//! use history_compactor::{
//!     CompactionSettings, ConcatenationSummarizer, HistoryCompactor, Message, MessageCountCounter,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> history_compactor::Result<()> {
//! let compactor = HistoryCompactor::new(
//!     Arc::new(ConcatenationSummarizer),
//!     Arc::new(MessageCountCounter),
//!     CompactionSettings::new(6, 0),
//! );
//!
//! let messages = vec![Message::human("Hi"), Message::assistant("Hello!")];
//! let first = compactor.compact(&messages, None).await?;
//! let next = compactor.compact(&messages, first.summary_state.as_ref()).await?;
//! # let _ = next;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;

pub use crate::config::Config;
pub use crate::context::{
    CompactionResult, CompactionSettings, ConcatenationSummarizer, ConversationLocks,
    ConversationState, HistoryCompactor, LLMSummarizer, Message, MessageCountCounter,
    PromptTemplateSet, PromptTemplates, Role, StepContext, StepUpdate, SummarizationStep,
    Summarizer, SummarizerConfig, SummarizerError, SummaryState, TiktokenCounter, TokenCounter,
    ToolCall, WordBasedCounter,
};
pub use crate::error::{CompactionError, Result};
