//! Answer synthesis from retrieved context.

use std::sync::Arc;

use tracing::{error, info};

use crate::document::SearchResult;
use crate::error::Result;
use crate::generation::TextGenerator;

/// Separator placed between chunk texts in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Instructions sent with every synthesis call.
pub const SYNTHESIS_INSTRUCTIONS: &str = "\
You are an assistant for exploring movie screenplays. \
The user message contains a request followed by excerpts from the script, separated by '---'.\n\
- By default, answer using only the excerpts: quote or describe the matching scenes faithfully \
and say plainly when the excerpts do not contain what was asked for.\n\
- Only when the user explicitly asks to transform the material (rewrite, continue, parody, \
change the setting or tone, write a new scene), use the excerpts as a starting point and \
expand on them creatively, keeping the characters and voice consistent.\n\
- If there are no excerpts, say that no matching scenes were found and answer only \
what can be answered without them.";

/// Join retrieved chunk texts in rank order.
pub fn join_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// Build the user message for a synthesis call.
pub fn synthesis_prompt(raw_query: &str, context: &str) -> String {
    let context = if context.trim().is_empty() { "(no matching excerpts)" } else { context };
    format!("Request:\n{raw_query}\n\nScript excerpts:\n{context}")
}

/// Composes the final answer from the user's original request and the context.
pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerSynthesizer {
    /// Create a synthesizer using the given generator.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate an answer. An empty context still produces a call.
    pub async fn synthesize(&self, raw_query: &str, context: &str) -> Result<String> {
        let answer = self
            .generator
            .generate(SYNTHESIS_INSTRUCTIONS, &synthesis_prompt(raw_query, context))
            .await
            .map_err(|e| {
                error!(error = %e, "answer synthesis failed");
                e
            })?;
        info!(context_len = context.len(), answer_len = answer.len(), "synthesized answer");
        Ok(answer.trim().to_string())
    }
}
