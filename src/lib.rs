//! # medchat-rs
//!
//! Retrieval-augmented response pipeline for a hospital chatbot.
//!
//! A patient message is classified into an intent, grounded in hospital
//! data (departments, doctors, reservations and ingested guide documents),
//! answered by a language model and cached so repeated questions skip the
//! model call.
//!
//! ## Features
//!
//! - **Intent classification**: deterministic weighted keyword cues
//! - **Context retrieval**: structured lookups plus fragment similarity search
//! - **Generation**: primary and secondary backends under one request deadline
//! - **Caching**: bounded TTL cache with failure cooldowns and a daily clear
//! - **`SQLite` knowledge base**: documents, fragments, embeddings, directory
//!
//! ```no_run
//! use std::sync::Arc;
//! use medchat_rs::{
//!     Embedder, FallbackEmbedder, Pipeline, PipelineConfig, ResponseCache, SqliteContextStore,
//!     SqliteStorage, DEFAULT_DIMENSIONS,
//! };
//!
//! # async fn run() -> medchat_rs::Result<()> {
//! let config = PipelineConfig::default();
//! let store = SqliteContextStore::new(SqliteStorage::open(".medchat/medchat.db")?);
//! let embedder: Arc<dyn Embedder> = Arc::new(FallbackEmbedder::new(DEFAULT_DIMENSIONS));
//! let pipeline = Pipeline::from_config(
//!     &config,
//!     Arc::new(store),
//!     embedder,
//!     ResponseCache::from_config(&config.cache),
//! )?;
//! let reply = pipeline.handle_message("내과 위치가 어디인가요?", None).await;
//! assert!(!reply.response.is_empty());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod chunking;
pub mod cli;
pub mod config;
pub mod core;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod io;
pub mod llm;
pub mod pipeline;
pub mod search;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{BackendError, Error, PipelineError, Result};

// Re-export core domain types
pub use core::{
    ChatReply, Chunk, ContextItem, ContextItemId, ContextSource, Document, GeneratedResponse,
    Intent, Message, PipelineState,
};

// Re-export configuration
pub use config::PipelineConfig;

// Re-export pipeline types
pub use pipeline::{ClearScheduler, Generator, Pipeline, ResponseCache, Retriever, classify};

// Re-export storage types
pub use storage::{
    ContextStore, DEFAULT_DB_PATH, SqliteContextStore, SqliteStorage, Storage, StorageStats,
};

// Re-export chunking types
pub use chunking::{Chunker, SentenceChunker};

// Re-export backend types
pub use llm::{BackendConfig, ExtractiveBackend, LanguageModel, OpenAiBackend, create_backend};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{
    DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, cosine_similarity, create_embedder,
};

// Re-export search types
pub use search::{
    DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K, SearchHit, SearchMode, search_fragments,
};

// Re-export ingestion
pub use ingest::{IngestReport, ingest_document, ingest_file};
