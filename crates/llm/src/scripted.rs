//! Scripted Generator
//!
//! A `TextGenerator` that replays a queue of canned responses and records
//! every prompt it receives. Useful for tests and offline demos.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::TextGenerator;
use crate::types::{GenerateOptions, LlmError, LlmResult};

/// Generator returning pre-seeded responses in FIFO order.
///
/// When the queue is empty the fallback response is returned if one was set,
/// otherwise `LlmError::ProviderUnavailable`.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<LlmResult<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<(String, GenerateOptions)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that always answers with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.lock_responses().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: LlmError) -> Self {
        self.lock_responses().push_back(Err(error));
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.lock_prompts().iter().map(|(p, _)| p.clone()).collect()
    }

    /// Options received with each prompt, in call order.
    pub fn options(&self) -> Vec<GenerateOptions> {
        self.lock_prompts().iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock_prompts().len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<LlmResult<String>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_prompts(&self) -> std::sync::MutexGuard<'_, Vec<(String, GenerateOptions)>> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> LlmResult<String> {
        self.lock_prompts().push((prompt.to_string(), options));

        let next = self.lock_responses().pop_front();
        match next {
            Some(response) => response,
            None => match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => {
                    tracing::debug!("[ScriptedGenerator] No scripted response left");
                    Err(LlmError::ProviderUnavailable {
                        message: "no scripted response left".to_string(),
                    })
                }
            },
        }
    }
}
