//! Data models for conversation compaction

use serde::{Deserialize, Serialize};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[serde(alias = "user")]
    Human,
    Assistant,
    Tool,
}

impl Role {
    /// Role name as used by OpenAI-compatible chat APIs
    pub fn as_chat_role(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Pending tool invocation requested by an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Tool result answering the call with `tool_call_id`
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Whether an assistant message still waits for tool results
    pub fn has_pending_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Whether a summarized range may end on this message.
    ///
    /// A range must not end on a user turn (its answer would be left out)
    /// nor on a tool request (its result would be separated from it).
    pub fn is_safe_cutoff(&self) -> bool {
        self.role != Role::Human && !self.has_pending_tool_calls()
    }
}

/// Record of what has been folded into the rolling summary so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryState {
    /// Latest summary text
    #[serde(alias = "summary")]
    pub summary_text: String,
    /// Ids of the messages summarized by the most recent batch only
    #[serde(default)]
    pub summarized_message_ids: Vec<String>,
    /// Running number of non-system messages summarized so far
    #[serde(default, alias = "total_summarized_messages")]
    pub total_summarized_count: usize,
}

impl SummaryState {
    pub fn new(
        summary_text: impl Into<String>,
        summarized_message_ids: Vec<String>,
        total_summarized_count: usize,
    ) -> Self {
        Self {
            summary_text: summary_text.into(),
            summarized_message_ids,
            total_summarized_count,
        }
    }
}

/// Output of a single compaction call
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionResult {
    /// Messages ready to be sent to the model
    pub messages: Vec<Message>,
    /// Summary state to carry into the next call, if any summary exists
    pub summary_state: Option<SummaryState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safe_cutoff() {
        assert!(!Message::human("hi").is_safe_cutoff());
        assert!(Message::assistant("hello").is_safe_cutoff());
        assert!(Message::tool("call_1", "42").is_safe_cutoff());
        assert!(Message::system("rules").is_safe_cutoff());

        let calling = Message::assistant("")
            .with_tool_calls(vec![ToolCall::new("call_1", "lookup", json!({"q": "x"}))]);
        assert!(calling.has_pending_tool_calls());
        assert!(!calling.is_safe_cutoff());
    }

    #[test]
    fn test_role_accepts_user_alias() {
        let message: Message =
            serde_json::from_value(json!({"role": "user", "content": "hi", "id": "1"})).unwrap();
        assert_eq!(message.role, Role::Human);
        assert_eq!(message.id.as_deref(), Some("1"));
        assert!(message.tool_calls.is_empty());
    }

    #[test]
    fn test_summary_state_accepts_legacy_field_names() {
        let state: SummaryState = serde_json::from_value(json!({
            "summary": "earlier talk",
            "summarized_message_ids": ["1", "2"],
            "total_summarized_messages": 2
        }))
        .unwrap();
        assert_eq!(state, SummaryState::new("earlier talk", vec!["1".into(), "2".into()], 2));
    }
}
