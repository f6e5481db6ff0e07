//! Text Generator Trait
//!
//! The single interface the planning engine needs from a language model.

use async_trait::async_trait;

use crate::types::{GenerateOptions, LlmResult};

/// Turns a prompt into text.
///
/// Any returned text, however malformed, is valid input for the plan parser;
/// implementations should only return `Err` when no text could be produced.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, options: GenerateOptions) -> LlmResult<String>;
}
