//! Sentence-packing chunker.
//!
//! Packs whole sentences (Unicode sentence boundaries) into fragments of at
//! most `chunk_size` bytes. Sentences longer than a fragment are split at
//! character boundaries. Trailing sentences of a fragment are repeated at
//! the start of the next one while they fit in `overlap` bytes.

use crate::chunking::{Chunker, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, MIN_CHUNK_SIZE};
use crate::core::Chunk;
use crate::error::{ChunkingError, Result};
use crate::io::{find_char_boundary, sentence_spans};
use std::ops::Range;

/// Sentence-aligned chunker.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl SentenceChunker {
    /// Creates a chunker with the given fragment size and overlap (bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is below [`MIN_CHUNK_SIZE`] or the
    /// overlap is not smaller than the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size < MIN_CHUNK_SIZE {
            return Err(ChunkingError::InvalidConfig {
                reason: format!("chunk_size must be at least {MIN_CHUNK_SIZE}"),
            }
            .into());
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap,
                size: chunk_size,
            }
            .into());
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Sentence spans, with over-long sentences cut into fragment-sized
    /// pieces at character boundaries.
    fn pieces(&self, text: &str) -> Vec<Range<usize>> {
        let mut pieces = Vec::new();
        for span in sentence_spans(text) {
            let mut start = span.start;
            while span.end - start > self.chunk_size {
                let cut = find_char_boundary(text, start + self.chunk_size);
                pieces.push(start..cut);
                start = cut;
            }
            if start < span.end {
                pieces.push(start..span.end);
            }
        }
        pieces
    }

    fn push_chunk(chunks: &mut Vec<Chunk>, document_id: i64, text: &str, range: Range<usize>) {
        if text[range.clone()].trim().is_empty() {
            return;
        }
        let index = chunks.len();
        chunks.push(Chunk::new(
            document_id,
            text[range.clone()].to_string(),
            range,
            index,
        ));
    }

    /// Number of trailing pieces of `window` that fit in the overlap.
    ///
    /// Never keeps the whole window, so every fragment advances.
    fn overlap_pieces(&self, window: &[Range<usize>]) -> usize {
        let mut kept = 0;
        let mut kept_len = 0;
        for piece in window.iter().rev() {
            if kept + 1 == window.len() || kept_len + piece.len() > self.overlap {
                break;
            }
            kept_len += piece.len();
            kept += 1;
        }
        kept
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, document_id: i64, text: &str) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut window: Vec<Range<usize>> = Vec::new();

        for piece in self.pieces(text) {
            let start = window.first().map(|r| r.start);
            if let Some(start) = start
                && piece.end - start > self.chunk_size
            {
                let end = window.last().map_or(start, |r| r.end);
                Self::push_chunk(&mut chunks, document_id, text, start..end);

                let keep = self.overlap_pieces(&window);
                window.drain(..window.len() - keep);
                while window
                    .first()
                    .is_some_and(|first| piece.end - first.start > self.chunk_size)
                {
                    window.remove(0);
                }
            }
            window.push(piece);
        }

        if let (Some(first), Some(last)) = (window.first(), window.last()) {
            Self::push_chunk(&mut chunks, document_id, text, first.start..last.end);
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "sentence"
    }
}
