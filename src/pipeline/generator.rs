//! Answer generation with a bounded prompt and backend fallback.

use crate::config::GenerationConfig;
use crate::core::{ContextItem, ContextItemId, GeneratedResponse, Intent};
use crate::error::{BackendError, PipelineError};
use crate::io::truncate_graphemes;
use crate::llm::prompt::render_user_message;
use crate::llm::{CompletionOptions, LanguageModel, Prompt, PromptEntry, load_system_prompt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use unicode_segmentation::UnicodeSegmentation;

/// Smallest remainder worth filling with a truncated item.
const MIN_TRUNCATED_CHARS: usize = 40;

type GenerationResult<T> = std::result::Result<T, PipelineError>;

/// Selects context entries for the prompt.
///
/// Items are taken in rank order while they fit in `budget` characters
/// (grapheme clusters). The first item that does not fit is truncated when
/// at least [`MIN_TRUNCATED_CHARS`] remain; everything after it is dropped.
#[must_use]
pub fn fit_context(context: &[ContextItem], budget: usize) -> Vec<PromptEntry> {
    let mut remaining = budget;
    let mut entries = Vec::new();

    for item in context {
        let text = item.prompt_text();
        let len = text.graphemes(true).count();
        if len <= remaining {
            remaining -= len;
            entries.push(PromptEntry { id: item.id(), text });
            continue;
        }
        if remaining >= MIN_TRUNCATED_CHARS {
            entries.push(PromptEntry {
                id: item.id(),
                text: truncate_graphemes(&text, remaining).to_string(),
            });
        }
        break;
    }
    entries
}

/// Builds prompts and calls the primary, then the secondary backend.
pub struct Generator {
    primary: Arc<dyn LanguageModel>,
    secondary: Option<Arc<dyn LanguageModel>>,
    system_prompt: String,
    char_budget: usize,
    options: CompletionOptions,
    backend_timeout: Duration,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.as_ref().map(|b| b.name()))
            .field("char_budget", &self.char_budget)
            .field("backend_timeout", &self.backend_timeout)
            .finish_non_exhaustive()
    }
}

impl Generator {
    /// Creates a generator.
    #[must_use]
    pub fn new(
        primary: Arc<dyn LanguageModel>,
        secondary: Option<Arc<dyn LanguageModel>>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            system_prompt: load_system_prompt(config.system_prompt_path.as_deref()),
            char_budget: config.context_char_budget,
            options: config.completion_options(),
            backend_timeout: Duration::from_millis(config.backend_timeout_ms),
        }
    }

    /// Builds the prompt and returns it with the ids of the items it holds.
    #[must_use]
    pub fn build_prompt(
        &self,
        question: &str,
        intent: Intent,
        context: &[ContextItem],
    ) -> (Prompt, Vec<ContextItemId>) {
        let entries = fit_context(context, self.char_budget);
        let ids = entries.iter().map(|entry| entry.id.clone()).collect();
        let prompt = Prompt {
            system: self.system_prompt.clone(),
            user: render_user_message(question, intent, &entries),
        };
        (prompt, ids)
    }

    /// Generates an answer before `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::GenerationTimeout`] when the deadline passes
    /// or every backend timed out, and [`PipelineError::GenerationFailed`]
    /// when every backend returned an error.
    #[instrument(skip_all, fields(intent = %intent, items = context.len()))]
    pub async fn generate(
        &self,
        question: &str,
        intent: Intent,
        context: &[ContextItem],
        deadline: Instant,
    ) -> GenerationResult<GeneratedResponse> {
        let started = Instant::now();
        let (prompt, ids) = self.build_prompt(question, intent, context);
        debug!(included = ids.len(), "prompt built");

        let attempts = async {
            let mut errors = Vec::new();
            for backend in std::iter::once(&self.primary).chain(self.secondary.as_ref()) {
                match self.call(backend.as_ref(), &prompt).await {
                    Ok(text) => {
                        info!(backend = backend.name(), "answer generated");
                        return Ok(GeneratedResponse::new(text, intent, ids, backend.name()));
                    }
                    Err(e) => {
                        warn!(backend = backend.name(), error = %e, "backend failed");
                        errors.push(e);
                    }
                }
            }
            Err(errors)
        };

        match tokio::time::timeout_at(deadline, attempts).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(errors)) if errors.iter().all(|e| matches!(e, BackendError::Timeout { .. })) => {
                Err(PipelineError::GenerationTimeout {
                    elapsed: started.elapsed(),
                })
            }
            Ok(Err(errors)) => Err(PipelineError::GenerationFailed {
                reason: errors
                    .last()
                    .map_or_else(|| "no backend configured".to_string(), ToString::to_string),
            }),
            Err(_) => Err(PipelineError::GenerationTimeout {
                elapsed: started.elapsed(),
            }),
        }
    }

    async fn call(&self, backend: &dyn LanguageModel, prompt: &Prompt) -> Result<String, BackendError> {
        let text = tokio::time::timeout(self.backend_timeout, backend.complete(prompt, &self.options))
            .await
            .map_err(|_| BackendError::Timeout {
                backend: backend.name().to_string(),
                timeout: self.backend_timeout,
            })??;
        if text.trim().is_empty() {
            return Err(BackendError::EmptyCompletion {
                backend: backend.name().to_string(),
            });
        }
        Ok(text)
    }
}
