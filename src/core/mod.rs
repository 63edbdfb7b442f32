//! Core domain models for medchat.
//!
//! This module contains the value types that flow through the response
//! pipeline (messages, intents, context items, generated responses) and the
//! knowledge-base models (documents and their fragments). These are pure
//! domain models with no I/O dependencies.

pub mod chunk;
pub mod context_item;
pub mod document;
pub mod intent;
pub mod message;
pub mod response;

pub use chunk::Chunk;
pub use context_item::{
    ContextItem, ContextItemId, ContextSource, EXACT_MATCH_SCORE, Entity, FieldValue, Fragment,
    Record, rank_items,
};
pub use document::{Document, DocumentMetadata};
pub use intent::{INTENT_SET_VERSION, Intent};
pub use message::Message;
pub use response::{ChatReply, GeneratedResponse, PipelineState};

/// Returns current Unix timestamp.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
