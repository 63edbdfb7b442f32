//! Knowledge-base ingestion: read, split, embed, store.

use crate::chunking::Chunker;
use crate::core::Document;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::io::read_file;
use crate::storage::{SqliteStorage, Storage};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Document id (the existing one for duplicates).
    pub document_id: i64,
    /// Document name.
    pub name: Option<String>,
    /// Fragments stored.
    pub chunk_count: usize,
    /// Fragments embedded.
    pub embedded_count: usize,
    /// Content was already in the knowledge base; nothing was stored.
    pub duplicate: bool,
}

/// Ingests a file.
///
/// Identical content (by SHA-256) already in the knowledge base is skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read, chunking or embedding
/// fails, or a storage write fails.
pub fn ingest_file(
    storage: &mut SqliteStorage,
    chunker: &dyn Chunker,
    embedder: &dyn Embedder,
    path: &Path,
    name: Option<&str>,
) -> Result<IngestReport> {
    let content = read_file(path)?;
    let mut document = Document::from_file(path.to_path_buf(), content);
    if let Some(name) = name {
        document = document.with_name(name);
    }
    ingest_document(storage, chunker, embedder, &document)
}

/// Ingests an in-memory document.
///
/// # Errors
///
/// Returns an error if chunking, embedding or a storage write fails.
pub fn ingest_document(
    storage: &mut SqliteStorage,
    chunker: &dyn Chunker,
    embedder: &dyn Embedder,
    document: &Document,
) -> Result<IngestReport> {
    if let Some(hash) = &document.metadata.content_hash
        && let Some(existing) = storage.find_document_by_hash(hash)?
    {
        info!(document_id = existing, "document already ingested");
        return Ok(IngestReport {
            document_id: existing,
            name: document.name.clone(),
            chunk_count: 0,
            embedded_count: 0,
            duplicate: true,
        });
    }

    let document_id = storage.add_document(document)?;
    let chunks = chunker.chunk(document_id, &document.content)?;
    let chunk_ids = storage.add_chunks(document_id, &chunks)?;
    debug!(document_id, chunks = chunks.len(), chunker = chunker.name(), "document split");

    let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let embeddings = embedder.embed_batch(&texts)?;
    let batch: Vec<(i64, Vec<f32>)> = chunk_ids.into_iter().zip(embeddings).collect();
    storage.store_embeddings(&batch, embedder.model_name())?;

    info!(
        document_id,
        chunks = chunks.len(),
        model = embedder.model_name(),
        "document ingested"
    );
    Ok(IngestReport {
        document_id,
        name: document.name.clone(),
        chunk_count: chunks.len(),
        embedded_count: batch.len(),
        duplicate: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SentenceChunker;
    use crate::embedding::FallbackEmbedder;

    const GUIDE: &str = "진료 시간은 평일 오전 9시부터 오후 5시까지입니다. \
        토요일은 오전 9시부터 12시까지 진료합니다. \
        주차장은 본관 지하 2층과 3층에 있습니다. \
        면회는 오후 6시부터 8시까지 가능합니다.";

    fn storage() -> SqliteStorage {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        storage
    }

    #[test]
    fn test_ingest_stores_and_embeds() {
        let mut storage = storage();
        let chunker = SentenceChunker::new(80, 0).unwrap();
        let embedder = FallbackEmbedder::new(64);
        let document = Document::from_content(GUIDE.to_string()).with_name("guide");

        let report = ingest_document(&mut storage, &chunker, &embedder, &document).unwrap();
        assert!(!report.duplicate);
        assert!(report.chunk_count > 1);
        assert_eq!(report.embedded_count, report.chunk_count);

        let stats = storage.stats().unwrap();
        assert_eq!(stats.embedding_count, report.chunk_count);
        assert_eq!(
            storage.get_document(report.document_id).unwrap().unwrap().metadata.chunk_count,
            Some(report.chunk_count)
        );
    }

    #[test]
    fn test_ingested_fragments_are_searchable() {
        let mut storage = storage();
        let chunker = SentenceChunker::new(80, 0).unwrap();
        let embedder = FallbackEmbedder::new(128);
        let document = Document::from_content(GUIDE.to_string());
        ingest_document(&mut storage, &chunker, &embedder, &document).unwrap();

        let query = embedder.embed("주차장 위치").unwrap();
        let best = storage.search_similar(&query, 1).unwrap();
        let fragments = storage.fragments(&[best[0].0]).unwrap();
        assert!(fragments[0].content.contains("주차장"));
    }

    #[test]
    fn test_duplicate_content_skipped() {
        let mut storage = storage();
        let chunker = SentenceChunker::default();
        let embedder = FallbackEmbedder::new(32);
        let document = Document::from_content(GUIDE.to_string());

        let first = ingest_document(&mut storage, &chunker, &embedder, &document).unwrap();
        let second = ingest_document(&mut storage, &chunker, &embedder, &document).unwrap();
        assert!(second.duplicate);
        assert_eq!(second.document_id, first.document_id);
        assert_eq!(storage.stats().unwrap().document_count, 1);
    }

    #[test]
    fn test_ingest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parking.txt");
        std::fs::write(&path, GUIDE).unwrap();

        let mut storage = storage();
        let report = ingest_file(
            &mut storage,
            &SentenceChunker::default(),
            &FallbackEmbedder::new(32),
            &path,
            None,
        )
        .unwrap();
        assert_eq!(report.name.as_deref(), Some("parking.txt"));
    }
}
