//! Pipeline step wrapping [`HistoryCompactor`]
//!
//! A step reads the conversation and the previous `summary_info` from a
//! pipeline state, compacts, and returns an update holding the new messages
//! and the context with `summary_info` replaced. Other context keys are
//! carried over untouched.

use super::compactor::HistoryCompactor;
use super::locks::ConversationLocks;
use super::models::{Message, SummaryState};
use crate::error::{CompactionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Context key holding the serialized [`SummaryState`]
pub const SUMMARY_INFO_KEY: &str = "summary_info";

const CONTEXT_KEY: &str = "context";
const DEFAULT_MESSAGES_KEY: &str = "messages";

/// Read access to a pipeline state
pub trait StepContext {
    /// Messages stored under `key`, `None` when absent
    fn messages(&self, key: &str) -> Result<Option<Vec<Message>>>;

    /// Shared context map, empty when absent
    fn context(&self) -> Result<Map<String, Value>>;

    /// Summary state stored in the context, if any
    fn summary_state(&self) -> Result<Option<SummaryState>> {
        match self.context()?.remove(SUMMARY_INFO_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

/// Dict-like state: `{"messages": [...], "context": {...}, ...}`
impl StepContext for Value {
    fn messages(&self, key: &str) -> Result<Option<Vec<Message>>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    fn context(&self) -> Result<Map<String, Value>> {
        match self.get(CONTEXT_KEY) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }
}

/// Structured pipeline state with a single messages channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            context: Map::new(),
        }
    }
}

impl StepContext for ConversationState {
    fn messages(&self, key: &str) -> Result<Option<Vec<Message>>> {
        if key == DEFAULT_MESSAGES_KEY {
            Ok(self.messages.clone())
        } else {
            Ok(None)
        }
    }

    fn context(&self) -> Result<Map<String, Value>> {
        Ok(self.context.clone())
    }
}

/// State changes produced by one step run
#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    /// Key the messages are written under
    pub messages_key: String,
    pub messages: Vec<Message>,
    /// Merged context, present only when there is summary state to write
    pub context: Option<Map<String, Value>>,
}

impl StepUpdate {
    /// Decode the `summary_info` written by this update
    pub fn summary_state(&self) -> Result<Option<SummaryState>> {
        match self.context.as_ref().and_then(|c| c.get(SUMMARY_INFO_KEY)) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Render the update as a JSON object
    pub fn into_json(self) -> Result<Value> {
        let mut update = Map::new();
        update.insert(self.messages_key, serde_json::to_value(self.messages)?);
        if let Some(context) = self.context {
            update.insert(CONTEXT_KEY.to_string(), Value::Object(context));
        }
        Ok(Value::Object(update))
    }

    /// Shallow-merge the update into a dict-like state
    pub fn merge_into(self, state: &mut Value) -> Result<()> {
        let update = self.into_json()?;
        match (state, update) {
            (Value::Object(target), Value::Object(fields)) => {
                target.extend(fields);
                Ok(())
            }
            (target, update) => {
                *target = update;
                Ok(())
            }
        }
    }

    /// Write the update into a structured state
    ///
    /// [`ConversationState`] has a single `messages` channel, so an update
    /// keyed anywhere else is rejected and `state` is left untouched.
    pub fn apply_to(self, state: &mut ConversationState) -> Result<()> {
        if self.messages_key != DEFAULT_MESSAGES_KEY {
            return Err(CompactionError::UnsupportedField(self.messages_key));
        }
        state.messages = Some(self.messages);
        if let Some(context) = self.context {
            state.context = context;
        }
        Ok(())
    }
}

/// Compaction as one step of a stateful pipeline
pub struct SummarizationStep {
    compactor: HistoryCompactor,
    messages_key: String,
    output_messages_key: String,
}

impl SummarizationStep {
    pub fn new(compactor: HistoryCompactor) -> Self {
        Self {
            compactor,
            messages_key: DEFAULT_MESSAGES_KEY.to_string(),
            output_messages_key: DEFAULT_MESSAGES_KEY.to_string(),
        }
    }

    /// Read messages from `key` instead of `messages`
    ///
    /// Custom keys only resolve on dict-like `serde_json::Value` input; a
    /// [`ConversationState`] exposes `messages` alone and yields
    /// [`CompactionError::MissingField`] for any other key.
    pub fn with_messages_key(mut self, key: impl Into<String>) -> Self {
        self.messages_key = key.into();
        self
    }

    /// Write messages to `key` instead of `messages`
    ///
    /// Only [`StepUpdate::into_json`] and [`StepUpdate::merge_into`] honour a
    /// custom key; [`StepUpdate::apply_to`] rejects it.
    pub fn with_output_messages_key(mut self, key: impl Into<String>) -> Self {
        self.output_messages_key = key.into();
        self
    }

    pub fn compactor(&self) -> &HistoryCompactor {
        &self.compactor
    }

    /// Run the step against `input`
    pub async fn run<S: StepContext + ?Sized>(&self, input: &S) -> Result<StepUpdate> {
        let messages = input
            .messages(&self.messages_key)?
            .ok_or_else(|| CompactionError::MissingField(self.messages_key.clone()))?;
        let mut context = input.context()?;
        let prior_state = input.summary_state()?;

        let result = self.compactor.compact(&messages, prior_state.as_ref()).await?;

        let context = match result.summary_state {
            Some(state) => {
                context.insert(SUMMARY_INFO_KEY.to_string(), serde_json::to_value(state)?);
                Some(context)
            }
            None => None,
        };

        debug!(
            "Summarization step produced {} messages under `{}`",
            result.messages.len(),
            self.output_messages_key
        );

        Ok(StepUpdate {
            messages_key: self.output_messages_key.clone(),
            messages: result.messages,
            context,
        })
    }

    /// Run the step while holding the lock of `conversation_id`
    pub async fn run_exclusive<S: StepContext + ?Sized>(
        &self,
        locks: &ConversationLocks,
        conversation_id: &str,
        input: &S,
    ) -> Result<StepUpdate> {
        let _guard = locks.acquire(conversation_id).await;
        self.run(input).await
    }
}
