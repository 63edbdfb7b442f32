//! Generated responses and the outbound reply payload.

use crate::core::{ContextItemId, Intent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text produced by the response generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    /// Answer text.
    pub text: String,
    /// Intent the answer was produced for.
    pub intent: Intent,
    /// Context items placed into the prompt, in rank order.
    pub context_ids: Vec<ContextItemId>,
    /// When the answer was produced.
    pub generated_at: DateTime<Utc>,
    /// Name of the backend that produced the answer.
    pub backend: String,
}

impl GeneratedResponse {
    /// Creates a response stamped with the current time.
    pub fn new(
        text: impl Into<String>,
        intent: Intent,
        context_ids: Vec<ContextItemId>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            intent,
            context_ids,
            generated_at: Utc::now(),
            backend: backend.into(),
        }
    }

    /// Whether two responses carry the same answer for the same context.
    ///
    /// The generation timestamp and backend are ignored.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.text == other.text && self.intent == other.intent && self.context_ids == other.context_ids
    }
}

/// Stages a request passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Request accepted.
    Received,
    /// Input rejected before classification.
    Invalid,
    /// Request key is cooling down after a recent failure.
    CoolingDown,
    /// Intent assigned.
    Classified,
    /// Context retrieved normally.
    ContextRetrieved,
    /// Context store failed; continuing with empty context.
    ContextDegraded,
    /// Answer served from the response cache.
    CacheHit,
    /// Answer produced by a backend.
    Generated,
    /// Backends failed or timed out; static fallback used.
    GenerationFallback,
    /// Answer written to the response cache.
    Cached,
    /// Reply handed back to the caller.
    Returned,
}

/// Payload returned to the front end.
///
/// Always well formed: failures show up as `degraded = true` with fallback
/// text, never as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Answer text.
    pub response: String,
    /// Classified intent.
    pub intent: Intent,
    /// Whether any stage fell back to a default.
    pub degraded: bool,
    /// Request identifier for log correlation.
    pub request_id: String,
    /// Whether the answer came from the response cache.
    pub cached: bool,
    /// Stages visited, in order.
    #[serde(skip)]
    pub states: Vec<PipelineState>,
}

impl ChatReply {
    /// Whether the request passed through the given state.
    #[must_use]
    pub fn visited(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }
}
