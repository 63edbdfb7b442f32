//! I/O utilities for medchat.
//!
//! Provides knowledge-base file reading with memory mapping for large
//! documents, along with Unicode helpers used by chunking and prompt
//! truncation.

pub mod reader;
pub mod unicode;

pub use reader::{FileReader, read_file};
pub use unicode::{find_char_boundary, sentence_spans, truncate_graphemes};
