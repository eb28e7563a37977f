use crate::error::LLMError;
use crate::llm_provider::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A single recorded `complete`/`generate_chat` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system_prompt: Option<String>,
    pub user_message: String,
}

/// Deterministic provider that replays queued responses in order.
///
/// Used by tests and offline runs. Once the queue is drained every call fails
/// with an invalid-response error.
pub struct ScriptedProvider {
    name: String,
    model: String,
    responses: Mutex<VecDeque<Result<String, LLMError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    /// Queue a mix of successful responses and failures
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LLMError>>,
    {
        Self {
            name: "scripted".to_string(),
            model: "scripted-model".to_string(),
            responses: Mutex::new(results.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider that fails every call with the given message
    pub fn failing(message: &str) -> Self {
        Self::from_results(vec![Err(LLMError::invalid_response("scripted", message))])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls made so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Responses still queued
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        _config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let (system_prompt, turns) = split_system(messages);
        let user_message = turns
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.calls.lock().push(RecordedCall {
            system_prompt,
            user_message,
        });

        let next = self.responses.lock().pop_front();
        let content = match next {
            Some(result) => result?,
            None => {
                return Err(LLMError::invalid_response(
                    &self.name,
                    "no scripted responses left",
                ))
            }
        };

        Ok(LLMResponse {
            content,
            usage: None,
            finish_reason: Some("stop".to_string()),
            model: self.model.clone(),
            provider: self.name.clone(),
        })
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
