//! Text-generation trait shared by the query rewriter and the answer synthesizer.

use async_trait::async_trait;

use crate::error::Result;

/// A chat model that turns a system instruction and a user message into text.
///
/// # Example
///
/// ```rust,ignore
/// use scene_rag::TextGenerator;
///
/// let text = generator.generate("Answer in one word.", "Capital of France?").await?;
/// ```
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation call.
    async fn generate(&self, system_instructions: &str, user_content: &str) -> Result<String>;

    /// Return the name of the underlying model.
    fn model_name(&self) -> &str;
}
