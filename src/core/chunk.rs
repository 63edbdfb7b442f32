//! Document fragments.
//!
//! Chunks are sentence-aligned segments of a document. Each chunk keeps its
//! byte position within the source document and becomes one entry in the
//! vector index.

use crate::io::find_char_boundary;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A fragment of a document.
///
/// # Examples
///
/// ```
/// use medchat_rs::core::Chunk;
///
/// let chunk = Chunk::new(1, "외래 접수는 1층입니다.".to_string(), 0..30, 0);
/// assert_eq!(chunk.document_id, 1);
/// assert!(chunk.id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier (assigned by storage layer, monotonic).
    pub id: Option<i64>,

    /// ID of the document this chunk belongs to.
    pub document_id: i64,

    /// Chunk content.
    pub content: String,

    /// Byte range in the original document.
    pub byte_range: Range<usize>,

    /// Sequential index within the document (0-based).
    pub index: usize,
}

impl Chunk {
    /// Creates a new chunk.
    #[must_use]
    pub const fn new(
        document_id: i64,
        content: String,
        byte_range: Range<usize>,
        index: usize,
    ) -> Self {
        Self {
            id: None,
            document_id,
            content,
            byte_range,
            index,
        }
    }

    /// Returns the size of the chunk in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Checks if the chunk is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Estimates token count using a simple heuristic.
    ///
    /// Uses the approximation of ~4 bytes per token.
    #[must_use]
    pub fn estimate_tokens(&self) -> usize {
        self.content.len().div_ceil(4)
    }

    /// Returns a preview of the chunk content (at most `max_len` bytes,
    /// cut at a character boundary).
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let end = find_char_boundary(&self.content, max_len);
            &self.content[..end]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_respects_char_boundary() {
        let chunk = Chunk::new(1, "가나다".to_string(), 0..9, 0);
        // '가' is 3 bytes; a 4-byte preview backs up to 3.
        assert_eq!(chunk.preview(4), "가");
        assert_eq!(chunk.preview(100), "가나다");
    }

    #[test]
    fn test_estimate_tokens() {
        let chunk = Chunk::new(1, "abcdefgh".to_string(), 0..8, 0);
        assert_eq!(chunk.estimate_tokens(), 2);
    }

    #[test]
    fn test_size_and_empty() {
        let chunk = Chunk::new(1, String::new(), 0..0, 0);
        assert!(chunk.is_empty());
        assert_eq!(chunk.size(), 0);
    }
}
