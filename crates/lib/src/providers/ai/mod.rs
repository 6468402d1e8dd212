pub mod embedding;
pub mod gemini;
pub mod openai;

use crate::{
    errors::PromptError,
    prompts::AssembledPrompt,
    types::{Completion, GenerationOptions},
};
use async_trait::async_trait;
pub use embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use std::fmt::Debug;

/// A trait for interacting with a hosted completion model.
///
/// Implementations receive the fully assembled, role-tagged prompt and return
/// the generated text.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug {
    /// Generates a completion for the given prompt.
    async fn generate(
        &self,
        prompt: &AssembledPrompt,
        options: &GenerationOptions,
    ) -> Result<Completion, PromptError>;
}
