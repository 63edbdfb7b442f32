//! Request orchestration: classify, retrieve, generate, cache.
//!
//! [`Pipeline::handle_message`] is the only entry point. It never fails:
//! every stage error becomes a degraded continuation and the caller always
//! receives a well-formed [`ChatReply`].

use crate::config::{PipelineConfig, ReplyConfig};
use crate::core::{ChatReply, ContextItem, Intent, Message, PipelineState};
use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::llm::{LanguageModel, create_backend};
use crate::pipeline::cache::ResponseCache;
use crate::pipeline::classifier::classify;
use crate::pipeline::fingerprint::{cooldown_key, fingerprint, normalize};
use crate::pipeline::generator::Generator;
use crate::pipeline::retriever::Retriever;
use crate::storage::ContextStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Span, debug, info, instrument, warn};
use uuid::Uuid;

/// The response pipeline.
///
/// Cheap to share behind an `Arc`; requests run concurrently and only
/// share the response cache.
#[derive(Debug)]
pub struct Pipeline {
    retriever: Retriever,
    generator: Generator,
    cache: ResponseCache,
    replies: ReplyConfig,
    max_message_chars: usize,
    request_timeout: Duration,
}

/// Trail of one request through the pipeline.
struct Trail {
    request_id: String,
    states: Vec<PipelineState>,
    degraded: bool,
}

impl Trail {
    fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            states: vec![PipelineState::Received],
            degraded: false,
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(state = ?state, "pipeline state");
        self.states.push(state);
    }

    fn reply(mut self, response: String, intent: Intent, cached: bool) -> ChatReply {
        self.enter(PipelineState::Returned);
        ChatReply {
            response,
            intent,
            degraded: self.degraded,
            request_id: self.request_id,
            cached,
            states: self.states,
        }
    }
}

impl Pipeline {
    /// Assembles a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn ContextStore>,
        embedder: Arc<dyn Embedder>,
        primary: Arc<dyn LanguageModel>,
        secondary: Option<Arc<dyn LanguageModel>>,
        cache: ResponseCache,
    ) -> Self {
        Self {
            retriever: Retriever::new(store, embedder, &config.retrieval),
            generator: Generator::new(primary, secondary, &config.generation),
            cache,
            replies: config.replies.clone(),
            max_message_chars: config.max_message_chars,
            request_timeout: config.request_timeout(),
        }
    }

    /// Builds the backends named in `config` and assembles a pipeline.
    ///
    /// When the primary backend cannot be built (for example, no API key)
    /// but a secondary is configured, the secondary serves alone.
    ///
    /// # Errors
    ///
    /// Returns an error if no configured backend can be built.
    pub fn from_config(
        config: &PipelineConfig,
        store: Arc<dyn ContextStore>,
        embedder: Arc<dyn Embedder>,
        cache: ResponseCache,
    ) -> Result<Self> {
        let secondary = config
            .generation
            .secondary
            .as_ref()
            .map(create_backend)
            .transpose()?;
        let (primary, secondary) = match (create_backend(&config.generation.primary), secondary) {
            (Ok(primary), secondary) => (primary, secondary),
            (Err(e), Some(secondary)) => {
                warn!(error = %e, backend = secondary.name(), "primary backend unavailable, using secondary only");
                (secondary, None)
            }
            (Err(e), None) => return Err(e),
        };
        Ok(Self::new(config, store, embedder, primary, secondary, cache))
    }

    /// Shared response cache.
    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    fn validate(&self, message: &Message) -> std::result::Result<(), PipelineError> {
        if message.is_blank() {
            return Err(PipelineError::InvalidMessage {
                reason: "empty message".to_string(),
            });
        }
        let chars = message.text().chars().count();
        if chars > self.max_message_chars {
            return Err(PipelineError::InvalidMessage {
                reason: format!("message has {chars} characters, limit is {}", self.max_message_chars),
            });
        }
        Ok(())
    }

    /// Answers one message.
    ///
    /// Always returns a reply; failures show up as `degraded = true` with
    /// the configured fallback text.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty, intent = tracing::field::Empty))]
    pub async fn handle_message(&self, text: &str, conversation_id: Option<&str>) -> ChatReply {
        let mut trail = Trail::new();
        Span::current().record("request_id", trail.request_id.as_str());
        let deadline = Instant::now() + self.request_timeout;
        let message = Message::new(text, conversation_id.map(str::to_string));

        if let Err(e) = self.validate(&message) {
            info!(error = %e, "message rejected");
            trail.enter(PipelineState::Invalid);
            trail.degraded = true;
            return trail.reply(self.replies.clarification.clone(), Intent::Fallback, false);
        }

        let intent = classify(message.text());
        Span::current().record("intent", intent.as_str());
        trail.enter(PipelineState::Classified);

        let normalized = normalize(message.text());
        let cooldown = cooldown_key(&normalized, intent);
        if self.cache.in_cooldown(&cooldown) {
            info!("request cooling down, skipping pipeline");
            trail.enter(PipelineState::CoolingDown);
            trail.degraded = true;
            return trail.reply(self.replies.fallback.clone(), intent, false);
        }

        let context = self.retrieve(&mut trail, intent, &message, deadline).await;
        if Instant::now() >= deadline {
            warn!("request deadline passed before generation");
            return self.fall_back(trail, intent, cooldown).await;
        }

        let key = fingerprint(
            &normalized,
            intent,
            &context.iter().map(ContextItem::id).collect::<Vec<_>>(),
        );
        if !trail.degraded
            && let Some(hit) = self.cache.get(&key).await
        {
            info!("answer served from cache");
            trail.enter(PipelineState::CacheHit);
            return trail.reply(hit.text.clone(), intent, true);
        }

        match self
            .generator
            .generate(message.text(), intent, &context, deadline)
            .await
        {
            Ok(response) => {
                trail.enter(PipelineState::Generated);
                let text = response.text.clone();
                if !trail.degraded {
                    self.cache.put(key, Arc::new(response)).await;
                    trail.enter(PipelineState::Cached);
                }
                trail.reply(text, intent, false)
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using fallback reply");
                self.fall_back(trail, intent, cooldown).await
            }
        }
    }

    /// Static fallback reply; repeats of the request cool down.
    async fn fall_back(&self, mut trail: Trail, intent: Intent, cooldown: String) -> ChatReply {
        trail.enter(PipelineState::GenerationFallback);
        trail.degraded = true;
        self.cache.mark_cooldown(cooldown).await;
        trail.reply(self.replies.fallback.clone(), intent, false)
    }

    async fn retrieve(
        &self,
        trail: &mut Trail,
        intent: Intent,
        message: &Message,
        deadline: Instant,
    ) -> Vec<ContextItem> {
        let result = tokio::time::timeout_at(deadline, self.retriever.retrieve(intent, message))
            .await
            .unwrap_or_else(|_| Err(PipelineError::context_unavailable("request deadline exceeded")));
        match result {
            Ok(items) => {
                trail.enter(PipelineState::ContextRetrieved);
                items
            }
            Err(e) => {
                warn!(error = %e, "continuing without context");
                trail.enter(PipelineState::ContextDegraded);
                trail.degraded = true;
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Fragment, Record};
    use crate::embedding::FallbackEmbedder;
    use crate::error::{BackendError, StorageError};
    use crate::llm::{CompletionOptions, ExtractiveBackend, Prompt};
    use crate::storage::RecordQuery;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Departments {
        fail: bool,
    }

    #[async_trait]
    impl ContextStore for Departments {
        async fn lookup(&self, query: RecordQuery) -> Result<Vec<Record>> {
            if self.fail {
                return Err(StorageError::Database("connection refused".to_string()).into());
            }
            Ok(["내과", "외과", "소아청소년과"]
                .iter()
                .zip(1..)
                .filter(|_| query.entity == crate::core::Entity::Departments)
                .take(query.bounded_limit())
                .map(|(name, key)| {
                    Record::new(crate::core::Entity::Departments, key).with_field("name", *name)
                })
                .collect())
        }

        async fn search(&self, _embedding: Vec<f32>, _k: usize) -> Result<Vec<(i64, f32)>> {
            if self.fail {
                return Err(StorageError::Database("connection refused".to_string()).into());
            }
            Ok(Vec::new())
        }

        async fn fragments(&self, _chunk_ids: Vec<i64>) -> Result<Vec<Fragment>> {
            Ok(Vec::new())
        }
    }

    struct Counting {
        inner: Option<ExtractiveBackend>,
        calls: AtomicUsize,
    }

    impl Counting {
        fn working() -> Arc<Self> {
            Arc::new(Self {
                inner: Some(ExtractiveBackend::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn broken() -> Arc<Self> {
            Arc::new(Self {
                inner: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(
            &self,
            prompt: &Prompt,
            options: &CompletionOptions,
        ) -> std::result::Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.inner {
                Some(backend) => backend.complete(prompt, options).await,
                None => Err(BackendError::Request {
                    backend: "counting".to_string(),
                    reason: "503".to_string(),
                }),
            }
        }
    }

    fn pipeline(
        fail_store: bool,
        primary: Arc<Counting>,
        secondary: Option<Arc<Counting>>,
    ) -> Pipeline {
        let config = PipelineConfig::default();
        Pipeline::new(
            &config,
            Arc::new(Departments { fail: fail_store }),
            Arc::new(FallbackEmbedder::new(32)),
            primary,
            secondary.map(|s| s as Arc<dyn LanguageModel>),
            ResponseCache::from_config(&config.cache),
        )
    }

    #[tokio::test]
    async fn test_department_question_is_generated_then_cached() {
        let backend = Counting::working();
        let p = pipeline(false, backend.clone(), None);

        let first = p.handle_message("진료과를 알려주세요", None).await;
        assert_eq!(first.intent, Intent::InfoQuery);
        assert!(!first.degraded);
        assert!(!first.cached);
        assert!(first.response.contains("내과"));
        assert!(first.visited(PipelineState::Cached));

        let second = p.handle_message("  진료과를   알려주세요 ", None).await;
        assert_eq!(second.response, first.response);
        assert!(second.cached);
        assert!(!second.degraded);
        assert!(second.visited(PipelineState::CacheHit));
        assert_eq!(backend.calls(), 1);
        assert_ne!(first.request_id, second.request_id);
    }

    #[tokio::test]
    async fn test_store_down_degrades() {
        let p = pipeline(true, Counting::working(), None);
        let reply = p.handle_message("진료과를 알려주세요", None).await;
        assert!(reply.degraded);
        assert!(!reply.response.is_empty());
        assert!(reply.visited(PipelineState::ContextDegraded));
        assert!(!reply.visited(PipelineState::Cached));
    }

    #[tokio::test]
    async fn test_backends_fail_then_cool_down() {
        let primary = Counting::broken();
        let secondary = Counting::broken();
        let p = pipeline(false, primary.clone(), Some(secondary.clone()));

        let reply = p.handle_message("진료과를 알려주세요", None).await;
        assert!(reply.degraded);
        assert_eq!(reply.response, PipelineConfig::default().replies.fallback);
        assert!(reply.visited(PipelineState::GenerationFallback));
        assert_eq!((primary.calls(), secondary.calls()), (1, 1));

        let retry = p.handle_message("진료과를 알려주세요", None).await;
        assert!(retry.degraded);
        assert!(retry.visited(PipelineState::CoolingDown));
        assert_eq!((primary.calls(), secondary.calls()), (1, 1));
    }

    /// Store whose queries never finish.
    struct Hanging;

    #[async_trait]
    impl ContextStore for Hanging {
        async fn lookup(&self, _query: RecordQuery) -> Result<Vec<Record>> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(Vec::new())
        }

        async fn search(&self, _embedding: Vec<f32>, _k: usize) -> Result<Vec<(i64, f32)>> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(Vec::new())
        }

        async fn fragments(&self, _chunk_ids: Vec<i64>) -> Result<Vec<Fragment>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_spent_in_retrieval_falls_back() {
        let config = PipelineConfig::default()
            .with_request_timeout(Duration::from_secs(1))
            .with_retrieval_timeout(Duration::from_secs(5));
        let backend = Counting::working();
        let p = Pipeline::new(
            &config,
            Arc::new(Hanging),
            Arc::new(FallbackEmbedder::new(32)),
            backend.clone(),
            None,
            ResponseCache::from_config(&config.cache),
        );

        let reply = p.handle_message("진료과를 알려주세요", None).await;
        assert_eq!(reply.response, config.replies.fallback);
        assert!(reply.degraded);
        assert!(reply.visited(PipelineState::GenerationFallback));
        assert!(!reply.visited(PipelineState::Generated));
        assert_eq!(backend.calls(), 0);

        let retry = p.handle_message("진료과를 알려주세요", None).await;
        assert!(retry.visited(PipelineState::CoolingDown));
        assert_eq!(retry.response, config.replies.fallback);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_message_short_circuits() {
        let backend = Counting::working();
        let p = pipeline(false, backend.clone(), None);

        let reply = p.handle_message("   ", None).await;
        assert_eq!(reply.response, PipelineConfig::default().replies.clarification);
        assert_eq!(reply.intent, Intent::Fallback);
        assert!(reply.degraded);
        assert_eq!(
            reply.states,
            [PipelineState::Received, PipelineState::Invalid, PipelineState::Returned]
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_overlong_message_rejected() {
        let p = pipeline(false, Counting::working(), None);
        let reply = p.handle_message(&"가".repeat(1001), None).await;
        assert!(reply.visited(PipelineState::Invalid));
    }

    #[tokio::test]
    async fn test_every_reply_reaches_returned() {
        let p = pipeline(false, Counting::working(), None);
        for text in ["안녕하세요", "머리가 아파요", "예약 조회", ""] {
            let reply = p.handle_message(text, Some("conv-1")).await;
            assert_eq!(reply.states.first(), Some(&PipelineState::Received));
            assert_eq!(reply.states.last(), Some(&PipelineState::Returned));
        }
    }
}
