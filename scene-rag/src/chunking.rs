//! Splitting scripts into overlapping chunks.
//!
//! This module provides the [`Chunker`] trait and [`SceneChunker`], which
//! starts a new chunk at every screenplay scene heading (`INT.`, `EXT.`) and
//! falls back to size-based splitting for scenes longer than the chunk size.

use crate::document::{CHUNK_INDEX_KEY, Chunk, Document};

/// Scene-heading markers used when no boundaries are configured.
pub const DEFAULT_BOUNDARIES: [&str; 2] = ["INT.", "EXT."];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text, position and metadata but no
/// embeddings. Embeddings are attached later by the pipeline. Implementations
/// must be deterministic: the same document always yields the same chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text at scene boundaries, then by size with overlap.
///
/// Every occurrence of a boundary string that starts the text or follows
/// whitespace begins a new segment, so `INT./EXT.` stays one heading. Segments
/// of at most `chunk_size` characters become one chunk each. Longer segments
/// are cut into pieces of at most `chunk_size` characters, breaking at the last
/// whitespace in range when there is one, with consecutive pieces sharing up to
/// `chunk_overlap` characters.
///
/// Lengths are counted in `char`s. Chunk IDs are `{document_id}_{position}` and
/// each chunk inherits the document metadata plus `chunk_index`.
///
/// # Example
///
/// ```rust
/// use scene_rag::{Chunker, Document, SceneChunker};
///
/// let chunker = SceneChunker::new(500, 50, ["INT."]);
/// let doc = Document::new("Demo", "INT. KITCHEN - NIGHT\nA kettle. INT. HALLWAY - NIGHT\nSteps.");
/// let chunks = chunker.chunk(&doc);
/// assert_eq!(chunks.len(), 2);
/// assert!(chunks.iter().all(|c| c.text.starts_with("INT.")));
/// ```
#[derive(Debug, Clone)]
pub struct SceneChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    boundaries: Vec<String>,
}

impl SceneChunker {
    /// Create a new `SceneChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: characters shared between consecutive size-based pieces
    /// * `boundaries`: strings that start a new chunk wherever they appear
    pub fn new<I, S>(chunk_size: usize, chunk_overlap: usize, boundaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let boundaries =
            boundaries.into_iter().map(Into::into).filter(|b: &String| !b.is_empty()).collect();
        Self { chunk_size: chunk_size.max(1), chunk_overlap, boundaries }
    }

    /// A chunker splitting on [`DEFAULT_BOUNDARIES`].
    pub fn with_default_boundaries(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::new(chunk_size, chunk_overlap, DEFAULT_BOUNDARIES)
    }

    /// Split raw text into chunk texts.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        split_at_boundaries(text, &self.boundaries)
            .into_iter()
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .flat_map(|segment| {
                if segment.chars().count() <= self.chunk_size {
                    vec![segment.to_string()]
                } else {
                    split_by_size(segment, self.chunk_size, self.chunk_overlap)
                }
            })
            .collect()
    }
}

/// Cut text before every boundary occurrence that starts the text or follows whitespace.
fn split_at_boundaries<'a>(text: &'a str, boundaries: &[String]) -> Vec<&'a str> {
    let mut cuts: Vec<usize> = boundaries
        .iter()
        .flat_map(|boundary| text.match_indices(boundary.as_str()).map(|(pos, _)| pos))
        .filter(|&pos| pos == 0 || text[..pos].ends_with(char::is_whitespace))
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut segments = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        if cut > start {
            segments.push(&text[start..cut]);
            start = cut;
        }
    }
    segments.push(&text[start..]);
    segments
}

/// Size-based splitting with overlap, preferring whitespace break points.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + chunk_size).min(len);
        if end < len {
            // Break at the whitespace right after the last full word, if any.
            if let Some(ws) = (start + 1..=end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        if end >= len {
            break;
        }

        let mut next = end.saturating_sub(chunk_overlap).max(start + 1);
        // Do not start the overlap mid-word.
        while next < end && !chars[next - 1].is_whitespace() {
            next += 1;
        }
        while next < len && chars[next].is_whitespace() {
            next += 1;
        }
        start = next;
    }

    pieces
}

impl Chunker for SceneChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(position, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), position.to_string());
                Chunk {
                    id: format!("{}_{position}", document.id),
                    text,
                    position,
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}
