//! Token-budgeted rolling summarization of conversation history
//!
//! Once the unsummarized part of a conversation no longer fits in
//! `max_tokens`, the oldest messages that do fit are folded into a single
//! summary. The returned [`SummaryState`] lets the next call resume from the
//! last boundary instead of rescanning the whole conversation.

use super::models::{CompactionResult, Message, SummaryState};
use super::summarizer::Summarizer;
use super::templates::{PromptTemplateSet, PromptTemplates};
use super::token_counter::TokenCounter;
use crate::error::{CompactionError, Result};
use crate::metrics::{CompactionOutcome, METRICS};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token budget for compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionSettings {
    /// Budget for the messages returned to the caller
    pub max_tokens: usize,
    /// Expected size of a generated summary
    pub max_summary_tokens: usize,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            max_summary_tokens: 256,
        }
    }
}

impl CompactionSettings {
    pub fn new(max_tokens: usize, max_summary_tokens: usize) -> Self {
        Self {
            max_tokens,
            max_summary_tokens,
        }
    }

    /// Validate that the summary budget fits inside the total budget
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 || self.max_summary_tokens >= self.max_tokens {
            return Err(CompactionError::InvalidConfiguration {
                max_tokens: self.max_tokens,
                max_summary_tokens: self.max_summary_tokens,
            });
        }
        Ok(())
    }
}

/// Absolute token ceiling for the unsummarized messages of one call.
///
/// The output holds at most `max_tokens`, and the summarizer turns at most
/// `max_tokens` of input into `max_summary_tokens`.
fn token_ceiling(max_tokens: usize, max_summary_tokens: usize) -> usize {
    max_tokens.saturating_mul(2).saturating_sub(max_summary_tokens)
}

/// Folds older conversation turns into a rolling summary
pub struct HistoryCompactor {
    summarizer: Arc<dyn Summarizer>,
    token_counter: Arc<dyn TokenCounter>,
    templates: Arc<dyn PromptTemplates>,
    settings: CompactionSettings,
}

impl HistoryCompactor {
    /// Create a compactor using the default prompt templates
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        token_counter: Arc<dyn TokenCounter>,
        settings: CompactionSettings,
    ) -> Self {
        Self {
            summarizer,
            token_counter,
            templates: Arc::new(PromptTemplateSet::default()),
            settings,
        }
    }

    /// Replace the prompt templates
    pub fn with_templates(mut self, templates: Arc<dyn PromptTemplates>) -> Self {
        self.templates = templates;
        self
    }

    pub fn settings(&self) -> &CompactionSettings {
        &self.settings
    }

    /// Compact `messages`, resuming from `prior_state` when given.
    ///
    /// Returns `[system?] + [summary?] + unsummarized tail` together with the
    /// state to pass into the next call. The summarizer is called at most
    /// once, and only when the unsummarized messages exceed `max_tokens`.
    ///
    /// # Errors
    ///
    /// - [`CompactionError::InvalidConfiguration`] if `max_summary_tokens >= max_tokens`
    /// - [`CompactionError::BudgetExceeded`] if the unsummarized messages reach
    ///   `2 * max_tokens - max_summary_tokens`
    /// - [`CompactionError::Summarizer`] if the summarizer call fails
    pub async fn compact(
        &self,
        messages: &[Message],
        prior_state: Option<&SummaryState>,
    ) -> Result<CompactionResult> {
        let result = self.compact_inner(messages, prior_state).await;
        if result.is_err() {
            METRICS.record_compaction(CompactionOutcome::Error, 0);
        }
        result
    }

    async fn compact_inner(
        &self,
        messages: &[Message],
        prior_state: Option<&SummaryState>,
    ) -> Result<CompactionResult> {
        self.settings.validate()?;

        let mut max_tokens = self.settings.max_tokens;
        let (system_message, conversation) = match messages.split_first() {
            Some((first, rest)) if first.is_system() => {
                max_tokens = max_tokens.saturating_sub(self.token_counter.count_one(first));
                (Some(first), rest)
            }
            _ => (None, messages),
        };

        if conversation.is_empty() {
            METRICS.record_compaction(CompactionOutcome::Noop, 0);
            return Ok(CompactionResult {
                messages: messages.to_vec(),
                summary_state: prior_state.cloned(),
            });
        }

        let already_summarized = prior_state.map_or(0, |s| s.total_summarized_count);
        if already_summarized > conversation.len() {
            warn!(
                "Summary state covers {} messages but the conversation has only {}",
                already_summarized,
                conversation.len()
            );
        }

        let range = self.select_range(conversation, already_summarized, max_tokens)?;
        let to_summarize = &conversation[range];

        let summary_state = if to_summarize.is_empty() {
            METRICS.record_compaction(CompactionOutcome::Noop, 0);
            prior_state.cloned()
        } else {
            let state = self.summarize(to_summarize, prior_state).await?;
            METRICS.record_compaction(CompactionOutcome::Summarized, to_summarize.len());
            Some(state)
        };

        let output = match &summary_state {
            Some(state) => {
                let tail = conversation
                    .get(state.total_summarized_count..)
                    .unwrap_or_default();
                self.templates
                    .final_messages(system_message, &state.summary_text, tail)
            }
            None => messages.to_vec(),
        };

        Ok(CompactionResult {
            messages: output,
            summary_state,
        })
    }

    /// Pick the range of `conversation` to fold into the summary.
    ///
    /// The range is empty when the unsummarized messages fit in `max_tokens`
    /// or when no safe cutoff exists.
    fn select_range(
        &self,
        conversation: &[Message],
        already_summarized: usize,
        max_tokens: usize,
    ) -> Result<Range<usize>> {
        let ceiling = token_ceiling(max_tokens, self.settings.max_summary_tokens);
        let start = already_summarized.min(conversation.len());

        // cutoff is inclusive; seeded one before the previous boundary
        let mut cutoff = already_summarized.saturating_sub(1);
        let mut n_tokens = 0usize;
        for (idx, message) in conversation.iter().enumerate().skip(start) {
            n_tokens = n_tokens.saturating_add(self.token_counter.count_one(message));

            if n_tokens <= max_tokens {
                cutoff = idx;
            }

            if n_tokens >= ceiling {
                METRICS.record_scan(n_tokens, true);
                warn!(
                    "Unsummarized messages reached {} tokens (ceiling {})",
                    n_tokens, ceiling
                );
                return Err(CompactionError::BudgetExceeded {
                    used: n_tokens,
                    limit: ceiling,
                });
            }
        }
        METRICS.record_scan(n_tokens, false);

        debug!(
            "Scanned {} unsummarized tokens from index {} (budget {}, cutoff {})",
            n_tokens, start, max_tokens, cutoff
        );

        if n_tokens <= max_tokens {
            return Ok(start..start);
        }

        let mut end = cutoff + 1;
        while end > start && !conversation[end - 1].is_safe_cutoff() {
            end -= 1;
        }

        if end == start {
            debug!("No safe cutoff found after index {}", start);
        }

        Ok(start..end)
    }

    async fn summarize(
        &self,
        to_summarize: &[Message],
        prior_state: Option<&SummaryState>,
    ) -> Result<SummaryState> {
        let (template, prompt) = match prior_state {
            Some(state) => (
                "continuation",
                self.templates.continuation(to_summarize, &state.summary_text),
            ),
            None => ("initial", self.templates.initial(to_summarize)),
        };

        let max_summary_tokens =
            Some(self.settings.max_summary_tokens).filter(|&tokens| tokens > 0);

        let summary_text = crate::time_operation!(
            METRICS.summarizer_duration,
            template,
            self.summarizer.summarize(&prompt, max_summary_tokens).await
        )?;

        let previous = prior_state.map_or(0, |s| s.total_summarized_count);
        let state = SummaryState {
            summary_text,
            summarized_message_ids: to_summarize.iter().filter_map(|m| m.id.clone()).collect(),
            total_summarized_count: previous + to_summarize.len(),
        };

        info!(
            "Summarized {} messages ({} in total)",
            to_summarize.len(),
            state.total_summarized_count
        );

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::ToolCall;
    use crate::context::summarizer::SummarizerError;
    use crate::context::token_counter::MessageCountCounter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSummarizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(
            &self,
            _prompt: &[Message],
            _max_tokens: Option<usize>,
        ) -> std::result::Result<String, SummarizerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("summary".to_string())
        }
    }

    fn compactor(max_tokens: usize, max_summary_tokens: usize) -> (HistoryCompactor, Arc<FixedSummarizer>) {
        let summarizer = Arc::new(FixedSummarizer {
            calls: AtomicUsize::new(0),
        });
        let compactor = HistoryCompactor::new(
            summarizer.clone(),
            Arc::new(MessageCountCounter),
            CompactionSettings::new(max_tokens, max_summary_tokens),
        );
        (compactor, summarizer)
    }

    #[test]
    fn test_settings_validation() {
        assert!(CompactionSettings::new(6, 0).validate().is_ok());
        assert!(CompactionSettings::new(6, 6).validate().is_err());
        assert!(CompactionSettings::new(0, 0).validate().is_err());
        assert!(CompactionSettings::default().validate().is_ok());
    }

    #[test]
    fn test_token_ceiling() {
        assert_eq!(token_ceiling(6, 0), 12);
        assert_eq!(token_ceiling(6, 2), 10);
        assert_eq!(token_ceiling(1, 5), 0);
    }

    #[test]
    fn test_select_range_trims_unsafe_tail() {
        let (compactor, _) = compactor(3, 0);
        let conversation = vec![
            Message::human("q1"),
            Message::assistant("").with_tool_calls(vec![ToolCall::new("c1", "search", json!({}))]),
            Message::tool("c1", "result"),
            Message::assistant("a1"),
        ];
        // cutoff at index 2 (tool result) is safe
        assert_eq!(compactor.select_range(&conversation, 0, 3).unwrap(), 0..3);

        let conversation = vec![
            Message::human("q1"),
            Message::assistant("a1"),
            Message::assistant("").with_tool_calls(vec![ToolCall::new("c1", "search", json!({}))]),
            Message::tool("c1", "result"),
        ];
        // the tool request at the cutoff stays unsummarized
        assert_eq!(compactor.select_range(&conversation, 0, 3).unwrap(), 0..2);
    }

    #[test]
    fn test_select_range_without_safe_cutoff_is_empty() {
        let (compactor, _) = compactor(2, 0);
        let conversation = vec![
            Message::human("q1"),
            Message::human("q2"),
            Message::assistant("a"),
        ];
        assert_eq!(compactor.select_range(&conversation, 0, 2).unwrap(), 0..0);
    }

    #[tokio::test]
    async fn test_system_only_input_passes_through() {
        let (compactor, summarizer) = compactor(6, 0);
        let prior = SummaryState::new("old", vec![], 3);
        let messages = vec![Message::system("rules")];

        let result = compactor.compact(&messages, Some(&prior)).await.unwrap();
        assert_eq!(result.messages, messages);
        assert_eq!(result.summary_state, Some(prior));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_state_yields_empty_tail() {
        let (compactor, summarizer) = compactor(6, 0);
        let prior = SummaryState::new("old", vec![], 10);
        let messages = vec![Message::human("a"), Message::assistant("b")];

        let result = compactor.compact(&messages, Some(&prior)).await.unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].content, "Summary of conversation earlier: old");
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }
}
