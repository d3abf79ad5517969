//! LLM-based summary generation

use super::models::{Message, ToolCall};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Produces summary text from a rendered prompt
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate a summary for `prompt`, capped at `max_tokens` when given
    async fn summarize(
        &self,
        prompt: &[Message],
        max_tokens: Option<usize>,
    ) -> Result<String, SummarizerError>;
}

/// Configuration for LLM summarizer
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub endpoint: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout: Duration,
    /// Total number of HTTP attempts per summary
    pub max_attempts: usize,
    pub temperature: Option<f32>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            temperature: Some(0.3),
        }
    }
}

/// LLM-based summarizer using OpenAI-compatible API
pub struct LLMSummarizer {
    client: Client,
    config: SummarizerConfig,
}

impl LLMSummarizer {
    /// Create a new LLM summarizer
    pub fn new(config: SummarizerConfig) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SummarizerError::InitializationError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    fn build_request(&self, prompt: &[Message], max_tokens: Option<usize>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: prompt.iter().map(ChatMessage::from).collect(),
            max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl Summarizer for LLMSummarizer {
    async fn summarize(
        &self,
        prompt: &[Message],
        max_tokens: Option<usize>,
    ) -> Result<String, SummarizerError> {
        if prompt.is_empty() {
            return Err(SummarizerError::EmptyPrompt);
        }

        debug!("Requesting summary for {} prompt messages", prompt.len());

        let request = self.build_request(prompt, max_tokens);
        let attempts = self.config.max_attempts.max(1);

        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                debug!("Retry attempt {} for summarization", attempt);
                tokio::time::sleep(Duration::from_millis(100 * (1 << attempt))).await;
            }

            let mut req = self.client.post(&self.config.endpoint).json(&request);

            if let Some(ref api_key) = self.config.api_key {
                req = req.bearer_auth(api_key.expose_secret());
            }

            match req.send().await {
                Ok(response) => {
                    if !response.status().is_success() {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        last_error = Some(SummarizerError::ApiError(format!(
                            "HTTP {}: {}",
                            status, body
                        )));
                        continue;
                    }

                    match response.json::<ChatCompletionResponse>().await {
                        Ok(resp) => match resp.choices.into_iter().next() {
                            Some(choice) => {
                                debug!("Summarization successful");
                                return Ok(choice.message.content.unwrap_or_default());
                            }
                            None => {
                                last_error = Some(SummarizerError::ApiError(
                                    "No choices in response".to_string(),
                                ));
                            }
                        },
                        Err(e) => {
                            last_error = Some(SummarizerError::ApiError(format!(
                                "Failed to parse response: {}",
                                e
                            )));
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(SummarizerError::NetworkError(e.to_string()));
                }
            }
        }

        warn!("Summarization failed after {} attempts", attempts);
        Err(last_error.unwrap_or(SummarizerError::Unknown))
    }
}

/// Joins the prompt contents instead of calling a model (offline fallback)
#[derive(Debug, Clone, Default)]
pub struct ConcatenationSummarizer;

#[async_trait]
impl Summarizer for ConcatenationSummarizer {
    async fn summarize(
        &self,
        prompt: &[Message],
        _max_tokens: Option<usize>,
    ) -> Result<String, SummarizerError> {
        Ok(prompt
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| format!("{}: {}", m.role.as_chat_role(), m.content))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Summarizer errors
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Summarization prompt is empty")]
    EmptyPrompt,

    #[error("Unknown error")]
    Unknown,
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_chat_role().to_string(),
            content: Some(message.content.clone()),
            tool_calls: message.tool_calls.iter().map(ChatToolCall::from).collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: ChatFunction,
}

impl From<&ToolCall> for ChatToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: "function".to_string(),
            function: ChatFunction {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
