//! Query rewriting ahead of embedding-based retrieval.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Result, SceneRagError};
use crate::generation::TextGenerator;

/// Instructions sent with every rewrite call.
pub const REWRITE_INSTRUCTIONS: &str = "\
You rewrite requests for a search engine over movie screenplays. \
Turn the user's request into a short, keyword-dense description of the scene \
being looked for: characters, locations, actions, objects and mood. \
Drop conversational phrasing, greetings and instructions about the answer format. \
Do not invent details that are not implied by the request. \
Reply with the rewritten query only, on a single line, without quotes.";

/// Rewrites free-form user requests into retrieval-friendly text.
///
/// One generation call per query. Failures propagate; there is no fallback to
/// the raw query.
pub struct QueryRewriter {
    generator: Arc<dyn TextGenerator>,
}

impl QueryRewriter {
    /// Create a rewriter using the given generator.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Rewrite a raw query.
    ///
    /// # Errors
    ///
    /// Returns the generator's error unchanged, or
    /// [`SceneRagError::GenerationError`] if the model returned nothing usable.
    pub async fn rewrite(&self, raw_query: &str) -> Result<String> {
        let output = self.generator.generate(REWRITE_INSTRUCTIONS, raw_query).await.map_err(|e| {
            error!(error = %e, "query rewrite failed");
            e
        })?;

        let rewritten = clean_rewrite(&output);
        if rewritten.is_empty() {
            error!("query rewrite returned empty text");
            return Err(SceneRagError::GenerationError {
                provider: self.generator.model_name().to_string(),
                message: "rewrite returned empty text".to_string(),
            });
        }

        info!(raw = raw_query, rewritten = %rewritten, "rewrote query");
        Ok(rewritten)
    }
}

/// Collapse the model output to one line and strip wrapping quotes.
fn clean_rewrite(output: &str) -> String {
    let joined = output.split_whitespace().collect::<Vec<_>>().join(" ");
    joined.trim_matches(|c: char| c == '"' || c == '\'' || c == '`').trim().to_string()
}
