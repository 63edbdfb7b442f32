//! Storage interfaces.
//!
//! [`Storage`] is the synchronous knowledge-base API used by ingestion and
//! the CLI. [`ContextStore`] is the async, read-only view the retriever
//! queries while answering a message.

use crate::core::{Chunk, Document, Fragment, Record};
use crate::error::Result;
use crate::storage::RecordQuery;
use async_trait::async_trait;
use serde::Serialize;

/// Persistent knowledge base.
pub trait Storage: Send {
    /// Creates the schema. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails or the database was
    /// written by a newer build.
    fn init(&mut self) -> Result<()>;

    /// Whether `init` has run on this database.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Inserts a document and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn add_document(&mut self, document: &Document) -> Result<i64>;

    /// Fetches a document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_document(&self, id: i64) -> Result<Option<Document>>;

    /// Finds a document with identical content.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_document_by_hash(&self, hash: &str) -> Result<Option<i64>>;

    /// Lists documents in insertion order (content omitted).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_documents(&self) -> Result<Vec<Document>>;

    /// Deletes a document with its fragments and embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist or deletion fails.
    fn delete_document(&mut self, id: i64) -> Result<()>;

    /// Stores the fragments of a document in one transaction and returns
    /// the assigned chunk ids, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is stored then.
    fn add_chunks(&mut self, document_id: i64, chunks: &[Chunk]) -> Result<Vec<i64>>;

    /// Fragments of a document, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunks(&self, document_id: i64) -> Result<Vec<Chunk>>;

    /// Runs a structured lookup.
    ///
    /// # Errors
    ///
    /// Returns an error for fields outside the allow-list or a failed query.
    fn lookup(&self, query: &RecordQuery) -> Result<Vec<Record>>;

    /// Row counts and schema information.
    ///
    /// # Errors
    ///
    /// Returns an error if a count query fails.
    fn stats(&self) -> Result<StorageStats>;
}

/// Knowledge-base statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    /// Documents stored.
    pub document_count: usize,
    /// Fragments stored.
    pub chunk_count: usize,
    /// Fragments with an embedding.
    pub embedding_count: usize,
    /// Departments stored.
    pub department_count: usize,
    /// Active doctors stored.
    pub doctor_count: usize,
    /// Reservations stored.
    pub reservation_count: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (file-backed databases only).
    pub db_size: Option<u64>,
}

/// Read-only context source used while answering messages.
///
/// Every method may be slow or fail; callers bound them with timeouts and
/// treat errors as "context unavailable".
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Structured lookup with a bounded, parameterized query.
    async fn lookup(&self, query: RecordQuery) -> Result<Vec<Record>>;

    /// Nearest fragments to `embedding`: `(chunk_id, similarity)`, similarity
    /// descending, equal similarities in chunk-id order, at most `k`.
    async fn search(&self, embedding: Vec<f32>, k: usize) -> Result<Vec<(i64, f32)>>;

    /// Loads fragments by chunk id. Unknown ids are skipped.
    async fn fragments(&self, chunk_ids: Vec<i64>) -> Result<Vec<Fragment>>;

    /// BM25 full-text hits: `(chunk_id, score)`, best first.
    ///
    /// Stores without a text index return nothing.
    async fn search_text(&self, _query: String, _k: usize) -> Result<Vec<(i64, f64)>> {
        Ok(Vec::new())
    }
}
