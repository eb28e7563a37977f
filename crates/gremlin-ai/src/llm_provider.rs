use crate::error::LLMError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for LLM operations
pub type LLMResult<T> = Result<T, LLMError>;

/// Configuration for generation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
    /// Top-p nucleus sampling parameter
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_tokens: Some(4096),
            top_p: None,
            stop: None,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Response from the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LLMResponse {
    /// Generated text content
    pub content: String,
    /// Token counts, when the provider reports them
    pub usage: Option<TokenUsage>,
    /// Finish reason (e.g., "stop", "end_turn", "max_tokens")
    pub finish_reason: Option<String>,
    /// Model used for generation
    pub model: String,
    /// Provider that served the request
    pub provider: String,
}

/// Main trait for reasoning-engine providers.
///
/// The analysis pipeline only ever calls [`LLMProvider::complete`]; concrete
/// transports implement [`LLMProvider::generate_chat`].
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a chat completion with message history
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse>;

    /// Complete a single system + user exchange using the provider's
    /// configured generation parameters
    async fn complete(&self, system_prompt: &str, user_message: &str) -> LLMResult<LLMResponse> {
        let messages = [Message::system(system_prompt), Message::user(user_message)];
        self.generate_chat(&messages, &self.generation_config())
            .await
    }

    /// Generation parameters used by `complete`
    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig::default()
    }

    /// Get the name of this provider
    fn provider_name(&self) -> &str;

    /// Get the model identifier
    fn model_name(&self) -> &str;
}

/// Split a message list into the system instruction and the remaining turns
pub(crate) fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let system = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    let rest = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .collect();
    (system, rest)
}
