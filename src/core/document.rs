//! Knowledge-base documents.
//!
//! Documents are the unstructured sources (guides, FAQs, notices) that get
//! split into fragments and indexed for similarity search.

use crate::core::current_timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// A document loaded into the knowledge base.
///
/// # Examples
///
/// ```
/// use medchat_rs::core::Document;
///
/// let doc = Document::from_content("진료 시간은 평일 9시부터 17시까지입니다.".to_string());
/// assert!(doc.id.is_none());
/// assert!(doc.metadata.content_hash.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (assigned by storage layer).
    pub id: Option<i64>,

    /// Optional display name.
    pub name: Option<String>,

    /// Source file path (if loaded from file).
    pub source: Option<PathBuf>,

    /// Document content.
    pub content: String,

    /// Document metadata.
    pub metadata: DocumentMetadata,
}

/// Metadata associated with a document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Content type or file extension (e.g., "txt", "md").
    pub content_type: Option<String>,

    /// Unix timestamp when the document was added.
    pub created_at: i64,

    /// Total size in bytes.
    pub size: usize,

    /// Number of fragments (set after chunking).
    pub chunk_count: Option<usize>,

    /// SHA-256 of the content, hex encoded.
    pub content_hash: Option<String>,
}

impl Document {
    /// Creates a document from content.
    #[must_use]
    pub fn from_content(content: String) -> Self {
        let metadata = DocumentMetadata {
            size: content.len(),
            created_at: current_timestamp(),
            content_hash: Some(content_hash(&content)),
            ..Default::default()
        };
        Self {
            id: None,
            name: None,
            source: None,
            content,
            metadata,
        }
    }

    /// Creates a document from a file path and its content.
    ///
    /// The name defaults to the file name and the content type to the
    /// file extension.
    #[must_use]
    pub fn from_file(path: PathBuf, content: String) -> Self {
        let mut doc = Self::from_content(content);
        doc.name = path.file_name().and_then(|n| n.to_str()).map(String::from);
        doc.metadata.content_type = path.extension().and_then(|e| e.to_str()).map(String::from);
        doc.source = Some(path);
        doc
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.metadata.size
    }
}

/// Hex-encoded SHA-256 of a string.
pub(crate) fn content_hash(content: &str) -> String {
    Sha256::digest(content.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_sets_name_and_type() {
        let doc = Document::from_file(PathBuf::from("guides/parking.md"), "주차 안내".to_string());
        assert_eq!(doc.name.as_deref(), Some("parking.md"));
        assert_eq!(doc.metadata.content_type.as_deref(), Some("md"));
        assert_eq!(doc.size(), "주차 안내".len());
    }

    #[test]
    fn test_hash_is_stable() {
        let a = Document::from_content("same".to_string());
        let b = Document::from_content("same".to_string());
        assert_eq!(a.metadata.content_hash, b.metadata.content_hash);
        assert_eq!(a.metadata.content_hash.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_with_name_overrides() {
        let doc = Document::from_file(PathBuf::from("a.txt"), String::new()).with_name("안내문");
        assert_eq!(doc.name.as_deref(), Some("안내문"));
    }
}
