//! Intent-driven context retrieval.
//!
//! Structured questions go to the record tables, open questions to the
//! fragment index. Every store call is bounded by the retrieval timeout and
//! any failure surfaces as [`PipelineError::ContextUnavailable`].

use crate::config::RetrievalConfig;
use crate::core::{ContextItem, Entity, Intent, Message, rank_items};
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::search::{RrfConfig, SearchMode, fuse_hybrid};
use crate::storage::{ContextStore, RecordQuery};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

type RetrievalResult<T> = std::result::Result<T, PipelineError>;

/// Words that ask about departments in general.
const DEPARTMENT_CUES: &[&str] = &["진료과", "department", "clinic"];

/// Words that ask about doctors in general.
const DOCTOR_CUES: &[&str] = &["의료진", "의사", "교수", "전문의", "doctor"];

fn mentions_any(text: &str, cues: &[&str]) -> bool {
    let lower = text.to_lowercase();
    cues.iter().any(|cue| lower.contains(cue))
}

/// Fetches the context for a classified message.
pub struct Retriever {
    store: Arc<dyn ContextStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    threshold: f32,
    mode: SearchMode,
    timeout: Duration,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_name())
            .field("top_k", &self.top_k)
            .field("threshold", &self.threshold)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Creates a retriever over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ContextStore>,
        embedder: Arc<dyn Embedder>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            top_k: config.top_k.max(1),
            threshold: config.similarity_threshold,
            mode: config.mode,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Retrieves at most `top_k` items for `message`, score-descending with
    /// ties in identifier order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ContextUnavailable`] if the store or the
    /// embedder fails, or the retrieval timeout passes.
    #[instrument(skip_all, fields(intent = %intent))]
    pub async fn retrieve(
        &self,
        intent: Intent,
        message: &Message,
    ) -> RetrievalResult<Vec<ContextItem>> {
        let mut items = tokio::time::timeout(self.timeout, self.gather(intent, message))
            .await
            .map_err(|_| {
                PipelineError::context_unavailable(format!(
                    "retrieval timed out after {:?}",
                    self.timeout
                ))
            })??;
        rank_items(&mut items, self.top_k);
        debug!(count = items.len(), "context retrieved");
        Ok(items)
    }

    async fn gather(&self, intent: Intent, message: &Message) -> RetrievalResult<Vec<ContextItem>> {
        let text = message.text();
        match intent {
            Intent::InfoQuery => {
                let records = self.named_entities(text).await?;
                if records.is_empty() {
                    self.semantic(text).await
                } else {
                    Ok(records)
                }
            }
            Intent::ReservationQuery => {
                let mut items = match message.conversation_id() {
                    Some(id) => {
                        self.lookup(RecordQuery::new(Entity::Reservations).equals("conversation_id", id))
                            .await?
                    }
                    None => Vec::new(),
                };
                items.extend(
                    self.lookup(RecordQuery::new(Entity::Departments).mentioned_in("name", text))
                        .await?,
                );
                Ok(items)
            }
            Intent::SymptomQuery => {
                let (records, fragments) = tokio::join!(
                    self.lookup(RecordQuery::new(Entity::Departments).keyword_in(text)),
                    self.semantic(text),
                );
                let mut items = records?;
                items.extend(fragments?);
                Ok(items)
            }
            Intent::Fallback => self.semantic(text).await,
        }
    }

    /// Departments and doctors the message names, or the full list when it
    /// asks about them in general.
    async fn named_entities(&self, text: &str) -> RetrievalResult<Vec<ContextItem>> {
        let asks_departments = mentions_any(text, DEPARTMENT_CUES);
        let asks_doctors = mentions_any(text, DOCTOR_CUES);

        let departments = self
            .lookup(RecordQuery::new(Entity::Departments).mentioned_in("name", text))
            .await?;
        let mut items = self
            .lookup(RecordQuery::new(Entity::Doctors).mentioned_in("name", text))
            .await?;

        if asks_doctors {
            let query = if departments.is_empty() {
                RecordQuery::new(Entity::Doctors)
            } else {
                RecordQuery::new(Entity::Doctors).mentioned_in("department", text)
            };
            items.extend(self.lookup(query.limit(self.top_k)).await?);
        }

        if departments.is_empty() && asks_departments {
            items.extend(
                self.lookup(RecordQuery::new(Entity::Departments).limit(self.top_k))
                    .await?,
            );
        }
        items.extend(departments);
        Ok(items)
    }

    async fn lookup(&self, query: RecordQuery) -> RetrievalResult<Vec<ContextItem>> {
        let limit = query.limit.min(self.top_k);
        let records = self
            .store
            .lookup(query.limit(limit))
            .await
            .map_err(PipelineError::context_unavailable)?;
        Ok(records.into_iter().map(ContextItem::record).collect())
    }

    /// Fragments nearest to the message text.
    async fn semantic(&self, text: &str) -> RetrievalResult<Vec<ContextItem>> {
        let embedder = Arc::clone(&self.embedder);
        let owned = text.to_string();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&owned))
            .await
            .map_err(PipelineError::context_unavailable)?
            .map_err(PipelineError::context_unavailable)?;

        let mut ranked = self
            .store
            .search(embedding, self.top_k)
            .await
            .map_err(PipelineError::context_unavailable)?;
        ranked.retain(|(_, score)| *score >= self.threshold);

        if self.mode == SearchMode::Hybrid {
            let text_hits = self
                .store
                .search_text(text.to_string(), self.top_k)
                .await
                .map_err(PipelineError::context_unavailable)?;
            ranked = fuse_hybrid(&ranked, &text_hits, self.top_k, &RrfConfig::default());
        }
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let scores: HashMap<i64, f32> = ranked.iter().copied().collect();
        let fragments = self
            .store
            .fragments(ranked.iter().map(|(id, _)| *id).collect())
            .await
            .map_err(PipelineError::context_unavailable)?;
        Ok(fragments
            .into_iter()
            .map(|fragment| {
                let score = scores.get(&fragment.chunk_id).copied().unwrap_or(0.0);
                ContextItem::fragment(fragment, score)
            })
            .collect())
    }
}
