//! Error types for medchat operations.
//!
//! This module provides the error hierarchy using `thiserror` for the
//! knowledge base, ingestion, language-model backends, the response pipeline
//! and CLI commands.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for medchat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for medchat operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Chunking-related errors (document splitting).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Response pipeline stage errors.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Language-model backend errors.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl Error {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (init command not run).
    #[error("knowledge base not initialized. Run: medchat-rs init")]
    NotInitialized,

    /// Document not found by ID or name.
    #[error("document not found: {identifier}")]
    DocumentNotFound {
        /// Document ID or name that was not found.
        identifier: String,
    },

    /// A structured query named a field the entity does not expose.
    #[error("unknown field '{field}' for entity {entity}")]
    UnknownField {
        /// Entity table name.
        entity: String,
        /// Rejected field name.
        field: String,
    },

    /// Referenced department does not exist.
    #[error("department not found: {name}")]
    DepartmentNotFound {
        /// Department name.
        name: String,
    },

    /// Schema version newer than this build understands.
    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema {
        /// Version stored in the database.
        found: u32,
        /// Version this build writes.
        supported: u32,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(String),
}

/// Chunking-specific errors for document splitting.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} must be less than chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Chunk size.
        size: usize,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Stage-level failures of the response pipeline.
///
/// All of these are recoverable: the orchestrator turns each one into a
/// degraded reply and never lets it reach the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The context store or vector index could not be reached.
    #[error("context unavailable: {reason}")]
    ContextUnavailable {
        /// Underlying cause.
        reason: String,
    },

    /// No backend answered before the deadline.
    #[error("generation timed out after {elapsed:?}")]
    GenerationTimeout {
        /// Time spent before giving up.
        elapsed: Duration,
    },

    /// Every configured backend returned an error.
    #[error("generation failed: {reason}")]
    GenerationFailed {
        /// Last backend error.
        reason: String,
    },

    /// Empty or malformed input.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// Why the message was rejected.
        reason: String,
    },
}

impl PipelineError {
    /// Creates a `ContextUnavailable` error from any displayable cause.
    pub fn context_unavailable(reason: impl std::fmt::Display) -> Self {
        Self::ContextUnavailable {
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a single language-model backend call.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend did not answer within its per-call timeout.
    #[error("{backend} timed out after {timeout:?}")]
    Timeout {
        /// Backend name.
        backend: String,
        /// Configured per-call timeout.
        timeout: Duration,
    },

    /// The backend answered with an error.
    #[error("{backend} request failed: {reason}")]
    Request {
        /// Backend name.
        backend: String,
        /// Error reported by the backend client.
        reason: String,
    },

    /// The backend answered without any text.
    #[error("{backend} returned an empty completion")]
    EmptyCompletion {
        /// Backend name.
        backend: String,
    },

    /// The backend is misconfigured (missing API key, bad model).
    #[error("{backend} misconfigured: {reason}")]
    Misconfigured {
        /// Backend name.
        backend: String,
        /// What is wrong.
        reason: String,
    },
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<async_openai::error::OpenAIError> for Error {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Self::Backend(BackendError::Request {
            backend: "openai".to_string(),
            reason: err.to_string(),
        })
    }
}
