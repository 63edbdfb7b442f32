//! Pipeline configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! missing) file works. CLI flags override individual values afterwards.

use crate::error::{Error, Result};
use crate::llm::{BackendConfig, CompletionOptions};
use crate::search::{DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K, SearchMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default clarification reply for empty or oversized messages.
pub const DEFAULT_CLARIFICATION_REPLY: &str =
    "질문을 이해하지 못했습니다. 궁금하신 내용을 조금 더 구체적으로 입력해 주세요.";

/// Default reply when no answer can be generated.
pub const DEFAULT_FALLBACK_REPLY: &str =
    "현재 답변을 생성하기 어렵습니다. 잠시 후 다시 시도해 주세요. 전화 문의는 대표번호 1577-3330으로 부탁드립니다.";

/// Default location of the config file (`~/.config/medchat-rs/config.json`).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("medchat-rs").join(CONFIG_FILE_NAME))
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Response cache.
    pub cache: CacheConfig,
    /// Context retrieval.
    pub retrieval: RetrievalConfig,
    /// Answer generation.
    pub generation: GenerationConfig,
    /// Canned replies.
    pub replies: ReplyConfig,
    /// Whole-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Longest accepted message, in characters.
    pub max_message_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            replies: ReplyConfig::default(),
            request_timeout_ms: 20_000,
            max_message_chars: 1_000,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached responses.
    pub capacity: u64,
    /// Lifetime of a cached response, in seconds.
    pub ttl_secs: u64,
    /// Lifetime of a cool-down marker, in seconds.
    pub cooldown_secs: u64,
    /// Scheduled daily clear.
    pub daily_clear: DailyClearConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_secs: 6 * 60 * 60,
            cooldown_secs: 30,
            daily_clear: DailyClearConfig::default(),
        }
    }
}

/// Daily cache clear at a local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyClearConfig {
    /// Whether the clear runs at all.
    pub enabled: bool,
    /// Hour (0-23, local time).
    pub hour: u32,
    /// Minute (0-59).
    pub minute: u32,
}

impl Default for DailyClearConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 3,
            minute: 0,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum context items per request.
    pub top_k: usize,
    /// Minimum cosine similarity for a fragment.
    pub similarity_threshold: f32,
    /// Vector-only or hybrid fragment search.
    pub mode: SearchMode,
    /// Timeout for retrieval, in milliseconds.
    pub timeout_ms: u64,
    /// Hospital guide whose department list is used while the departments
    /// table is empty.
    pub department_list: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            mode: SearchMode::Vector,
            timeout_ms: 3_000,
            department_list: None,
        }
    }
}

/// Generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Backend tried first.
    pub primary: BackendConfig,
    /// Backend tried when the primary fails or times out.
    pub secondary: Option<BackendConfig>,
    /// Characters of context placed into the prompt.
    pub context_char_budget: usize,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Timeout of a single backend call, in milliseconds.
    pub backend_timeout_ms: u64,
    /// Replacement system prompt file.
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            primary: BackendConfig::openai(),
            secondary: Some(BackendConfig::Extractive),
            context_char_budget: 3_000,
            max_tokens: 512,
            temperature: 0.2,
            backend_timeout_ms: 8_000,
            system_prompt_path: None,
        }
    }
}

impl GenerationConfig {
    /// Sampling options for backend calls.
    #[must_use]
    pub const fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Canned replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// Reply to empty or oversized input.
    pub clarification: String,
    /// Reply when generation fails, times out or is cooling down.
    pub fallback: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            clarification: DEFAULT_CLARIFICATION_REPLY.to_string(),
            fallback: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("invalid {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the default file if it exists,
    /// otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file is invalid, or an explicitly
    /// given file is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let clear = &self.cache.daily_clear;
        if clear.hour > 23 || clear.minute > 59 {
            return Err(Error::config(format!(
                "daily clear time {:02}:{:02} is not a valid time of day",
                clear.hour, clear.minute
            )));
        }
        if self.cache.capacity == 0 {
            return Err(Error::config("cache capacity must be positive"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval top_k must be positive"));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(Error::config("similarity threshold must be within [-1, 1]"));
        }
        if self.max_message_chars == 0 {
            return Err(Error::config("max_message_chars must be positive"));
        }
        if self.request_timeout_ms == 0
            || self.retrieval.timeout_ms == 0
            || self.generation.backend_timeout_ms == 0
        {
            return Err(Error::config("timeouts must be positive"));
        }
        if self.replies.fallback.trim().is_empty() || self.replies.clarification.trim().is_empty() {
            return Err(Error::config("canned replies must not be empty"));
        }
        Ok(())
    }

    /// Sets the primary backend.
    #[must_use]
    pub fn with_primary(mut self, backend: BackendConfig) -> Self {
        self.generation.primary = backend;
        self
    }

    /// Sets (or removes) the secondary backend.
    #[must_use]
    pub fn with_secondary(mut self, backend: Option<BackendConfig>) -> Self {
        self.generation.secondary = backend;
        self
    }

    /// Sets the retrieval size.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.retrieval.top_k = top_k;
        self
    }

    /// Sets the fragment search mode.
    #[must_use]
    pub const fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.retrieval.mode = mode;
        self
    }

    /// Sets the whole-request deadline.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the per-backend-call timeout.
    #[must_use]
    pub const fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.generation.backend_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the retrieval timeout.
    #[must_use]
    pub const fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval.timeout_ms = duration_ms(timeout);
        self
    }

    /// Enables or disables the daily cache clear.
    #[must_use]
    pub const fn with_daily_clear(mut self, enabled: bool) -> Self {
        self.cache.daily_clear.enabled = enabled;
        self
    }

    /// Whole-request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Retrieval timeout.
    #[must_use]
    pub const fn retrieval_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieval.timeout_ms)
    }

    /// Per-backend-call timeout.
    #[must_use]
    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.generation.backend_timeout_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
