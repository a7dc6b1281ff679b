//! Metadata filtering and author extraction from raw queries.
//!
//! A query such as `"scenes by John Smith about trains"` names a writer after
//! the marker word `by`. [`extract_author`] pulls that name out so retrieval
//! can be restricted to chunks whose `author` metadata contains it. When the
//! query names nobody, retrieval simply runs unfiltered.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{AUTHOR_KEY, Chunk};

/// Marker word `by` (any case) followed by a run of capitalized name words.
static AUTHOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:\bby)\s+([A-Z][A-Za-z'\-]*(?:[ \t]+[A-Z][A-Za-z'\-]*)*)")
        .expect("author pattern is valid")
});

/// Extract an author name from a raw query.
///
/// Returns `None` when the query has no `by <Name>` phrase. The marker is
/// matched in any case, but the name must be written as capitalized words:
/// `"by john smith"` yields nothing, and a run of capitalized words after the
/// marker is taken whole.
///
/// ```rust
/// use scene_rag::filter::extract_author;
///
/// assert_eq!(extract_author("scenes by John Smith about trains").as_deref(), Some("John Smith"));
/// assert_eq!(extract_author("a scene about trains"), None);
/// ```
pub fn extract_author(query: &str) -> Option<String> {
    AUTHOR_PATTERN
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Restricts search candidates to chunks whose metadata field contains a value.
///
/// Matching is a case-insensitive substring test, so `"john smith"` matches an
/// `author` field of `"Jane Doe, John Smith"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// The metadata key to inspect.
    pub field: String,
    /// The value that must be contained in the field.
    pub value: String,
}

impl MetadataFilter {
    /// A filter on an arbitrary metadata field.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), value: value.into() }
    }

    /// A filter on the `author` metadata field.
    pub fn author(value: impl Into<String>) -> Self {
        Self::new(AUTHOR_KEY, value)
    }

    /// Whether the chunk passes this filter. Chunks lacking the field never match.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        chunk
            .metadata
            .get(&self.field)
            .is_some_and(|v| v.to_lowercase().contains(&self.value.to_lowercase()))
    }
}
