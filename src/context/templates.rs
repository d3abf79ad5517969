//! Prompt templates used to request and apply summaries

use super::models::Message;
use serde::{Deserialize, Serialize};

/// Formatting functions applied by the compactor.
///
/// Implementations must keep the output ordering of [`final_messages`]:
/// the reserved system message first, the summary second, the tail last.
///
/// [`final_messages`]: PromptTemplates::final_messages
pub trait PromptTemplates: Send + Sync {
    /// Prompt asking for a first summary of `messages`
    fn initial(&self, messages: &[Message]) -> Vec<Message>;

    /// Prompt asking to extend `existing_summary` with `messages`
    fn continuation(&self, messages: &[Message], existing_summary: &str) -> Vec<Message>;

    /// Messages handed back to the caller once a summary exists
    fn final_messages(
        &self,
        system_message: Option<&Message>,
        summary: &str,
        messages: &[Message],
    ) -> Vec<Message>;
}

/// Default template set, configurable from the `[templates]` config section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplateSet {
    /// Instruction appended after the messages of a first summary
    pub initial_instruction: String,
    /// Instruction appended when extending; `{existing_summary}` is substituted
    pub continuation_instruction: String,
    /// Content of the synthetic summary message; `{summary}` is substituted
    pub summary_message: String,
}

impl Default for PromptTemplateSet {
    fn default() -> Self {
        Self {
            initial_instruction: "Create a summary of the conversation above:".to_string(),
            continuation_instruction: "This is a summary of the conversation to date: {existing_summary}\n\n\
                Extend the summary by taking into account the new messages above:"
                .to_string(),
            summary_message: "Summary of conversation earlier: {summary}".to_string(),
        }
    }
}

impl PromptTemplates for PromptTemplateSet {
    fn initial(&self, messages: &[Message]) -> Vec<Message> {
        let mut prompt = messages.to_vec();
        prompt.push(Message::human(self.initial_instruction.clone()));
        prompt
    }

    fn continuation(&self, messages: &[Message], existing_summary: &str) -> Vec<Message> {
        let mut prompt = messages.to_vec();
        prompt.push(Message::human(
            self.continuation_instruction
                .replace("{existing_summary}", existing_summary),
        ));
        prompt
    }

    fn final_messages(
        &self,
        system_message: Option<&Message>,
        summary: &str,
        messages: &[Message],
    ) -> Vec<Message> {
        let mut output = Vec::with_capacity(messages.len() + 2);
        output.extend(system_message.cloned());
        output.push(Message::system(self.summary_message.replace("{summary}", summary)));
        output.extend_from_slice(messages);
        output
    }
}
