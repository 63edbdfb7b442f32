//! Document chunking for the knowledge base.
//!
//! Documents are split into sentence-aligned fragments before embedding so
//! each vector in the index covers a coherent piece of text.

pub mod sentence;

pub use sentence::SentenceChunker;

use crate::core::Chunk;
use crate::error::Result;

/// Default fragment size in bytes (~500 tokens at 4 bytes/token).
pub const DEFAULT_CHUNK_SIZE: usize = 2_000;

/// Default overlap in bytes between consecutive fragments.
pub const DEFAULT_OVERLAP: usize = 200;

/// Smallest fragment size accepted.
pub const MIN_CHUNK_SIZE: usize = 16;

/// Trait for splitting document text into fragments.
///
/// Implementations must be deterministic: the same text always yields the
/// same fragments, so re-ingesting a document reproduces its index entries.
///
/// # Examples
///
/// ```
/// use medchat_rs::chunking::{Chunker, SentenceChunker};
///
/// let chunker = SentenceChunker::new(64, 0).unwrap();
/// let text = "진료 시간은 평일 9시부터입니다. 토요일은 오전만 진료합니다.";
/// let chunks = chunker.chunk(1, text).unwrap();
/// assert!(!chunks.is_empty());
/// ```
pub trait Chunker: Send + Sync {
    /// Splits `text` into fragments belonging to `document_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if chunking fails.
    fn chunk(&self, document_id: i64, text: &str) -> Result<Vec<Chunk>>;

    /// Returns the name of the chunking strategy.
    fn name(&self) -> &'static str;
}
