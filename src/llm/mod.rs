//! Language-model backends.
//!
//! The generator talks to backends through [`LanguageModel`]. Backends are
//! built from [`BackendConfig`] so the primary and secondary choice lives in
//! configuration.

pub mod extractive;
pub mod openai;
pub mod prompt;

pub use extractive::ExtractiveBackend;
pub use openai::OpenAiBackend;
pub use prompt::{Prompt, PromptEntry, SYSTEM_PROMPT, load_system_prompt};

use crate::error::{BackendError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Environment variable read for the API key by default.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.2,
        }
    }
}

/// A text-completion backend.
///
/// Calls may be slow; the caller bounds them with a timeout and may drop
/// the future at any point.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Name used in logs and stored on generated responses.
    fn name(&self) -> &str;

    /// Completes `prompt`.
    async fn complete(
        &self,
        prompt: &Prompt,
        options: &CompletionOptions,
    ) -> std::result::Result<String, BackendError>;
}

/// Backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// OpenAI-compatible chat completions endpoint.
    #[serde(rename = "openai")]
    OpenAi {
        /// Model name.
        #[serde(default = "default_model")]
        model: String,
        /// Endpoint base URL (e.g. a local Ollama server); the OpenAI API
        /// when absent.
        #[serde(default)]
        base_url: Option<String>,
        /// Environment variable holding the API key.
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
    },
    /// Offline answer composed from the retrieved context.
    Extractive,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl BackendConfig {
    /// OpenAI backend with default model and key variable.
    #[must_use]
    pub fn openai() -> Self {
        Self::OpenAi {
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

/// Builds a backend from its configuration.
///
/// # Errors
///
/// Returns [`BackendError::Misconfigured`] when the OpenAI backend has no
/// API key and no custom base URL.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn LanguageModel>> {
    match config {
        BackendConfig::OpenAi {
            model,
            base_url,
            api_key_env,
        } => {
            let api_key = std::env::var(api_key_env).ok().filter(|k| !k.is_empty());
            if api_key.is_none() && base_url.is_none() {
                return Err(BackendError::Misconfigured {
                    backend: "openai".to_string(),
                    reason: format!("{api_key_env} is not set"),
                }
                .into());
            }
            Ok(Arc::new(OpenAiBackend::new(
                model,
                base_url.as_deref(),
                api_key.as_deref(),
            )))
        }
        BackendConfig::Extractive => Ok(Arc::new(ExtractiveBackend::new())),
    }
}
