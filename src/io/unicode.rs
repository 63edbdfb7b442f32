//! Unicode utilities for text processing.
//!
//! Character-boundary helpers for byte-budgeted truncation and sentence
//! segmentation (UAX #29) for chunking Korean and English documents.

use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

/// Finds a valid UTF-8 character boundary at or before the given position.
///
/// # Examples
///
/// ```
/// use medchat_rs::io::find_char_boundary;
///
/// let s = "진료 안내";
/// assert_eq!(find_char_boundary(s, 3), 3); // after '진'
/// assert_eq!(find_char_boundary(s, 4), 3); // inside '료', backs up
/// ```
#[must_use]
pub const fn find_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let bytes = s.as_bytes();
    let mut boundary = pos;
    // UTF-8 continuation bytes start with 10xxxxxx (0x80-0xBF)
    while boundary > 0 && (bytes[boundary] & 0xC0) == 0x80 {
        boundary -= 1;
    }
    boundary
}

/// Truncates a string to at most `max_graphemes` grapheme clusters.
#[must_use]
pub fn truncate_graphemes(s: &str, max_graphemes: usize) -> &str {
    match s.grapheme_indices(true).nth(max_graphemes) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Byte ranges of the sentences in `s`, following Unicode sentence
/// boundaries.
///
/// Ranges are contiguous and cover the whole input, so trailing whitespace
/// stays attached to the sentence it follows.
#[must_use]
pub fn sentence_spans(s: &str) -> Vec<Range<usize>> {
    s.split_sentence_bound_indices()
        .map(|(start, sentence)| start..start + sentence.len())
        .collect()
}
