//! `SQLite` knowledge base.
//!
//! Holds documents, fragments, their embeddings and the FTS5 index, plus
//! the structured department, doctor and reservation tables.

// SQLite stores integers as i64; only non-negative sizes and offsets are
// written, so the usize <-> i64 casts cannot lose information.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::core::{Chunk, Document, DocumentMetadata, FieldValue, Fragment, Record, current_timestamp};
use crate::error::{Result, StorageError};
use crate::search::rank_by_similarity;
use crate::storage::directory::{NewDepartment, NewDoctor, NewReservation};
use crate::storage::query::{RecordQuery, build_sql, schema_for};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{Storage, StorageStats};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};

/// SQLite-backed knowledge base.
///
/// ```no_run
/// use medchat_rs::storage::{SqliteStorage, Storage};
///
/// let mut storage = SqliteStorage::open("medchat.db").unwrap();
/// storage.init().unwrap();
/// ```
pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").field("path", &self.path).finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Database path, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(n as usize)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized()? {
            Ok(())
        } else {
            Err(StorageError::NotInitialized.into())
        }
    }

    fn department_id(&self, name: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT id FROM departments WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?
            .ok_or_else(|| {
                StorageError::DepartmentNotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    // ==================== Directory ====================

    /// Inserts a department (or updates the one with the same name) and
    /// merges its keywords. Returns the department id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_department(&mut self, department: &NewDepartment) -> Result<i64> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        tx.execute(
            r"
            INSERT INTO departments (name, code, description, phone, location)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name) DO UPDATE SET
                code = COALESCE(excluded.code, code),
                description = COALESCE(excluded.description, description),
                phone = COALESCE(excluded.phone, phone),
                location = COALESCE(excluded.location, location)
            ",
            params![
                department.name.trim(),
                department.code,
                department.description,
                department.phone,
                department.location,
            ],
        )
        .map_err(StorageError::from)?;

        let id: i64 = tx
            .query_row(
                "SELECT id FROM departments WHERE name = ?",
                params![department.name.trim()],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO department_keywords (department_id, keyword) VALUES (?, ?)",
                )
                .map_err(StorageError::from)?;
            for keyword in department.keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
                stmt.execute(params![id, keyword])
                    .map_err(StorageError::from)?;
            }
        }

        tx.commit().map_err(StorageError::from)?;
        Ok(id)
    }

    /// Inserts an active doctor.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DepartmentNotFound`] for an unknown department.
    pub fn add_doctor(&mut self, doctor: &NewDoctor) -> Result<i64> {
        let department_id = self.department_id(&doctor.department)?;
        self.conn
            .execute(
                r"
                INSERT INTO doctors (name, department_id, title, specialty, schedule)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    doctor.name.trim(),
                    department_id,
                    doctor.title,
                    doctor.specialty,
                    doctor.schedule,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DepartmentNotFound`] for an unknown
    /// department; a named doctor must belong to it.
    pub fn add_reservation(&mut self, reservation: &NewReservation) -> Result<i64> {
        let department_id = self.department_id(&reservation.department)?;
        let doctor_id: Option<i64> = match &reservation.doctor {
            Some(name) => Some(
                self.conn
                    .query_row(
                        "SELECT id FROM doctors WHERE name = ? AND department_id = ? AND active = 1",
                        params![name, department_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| {
                        StorageError::Database(format!(
                            "doctor {name} not found in {}",
                            reservation.department
                        ))
                    })?,
            ),
            None => None,
        };

        self.conn
            .execute(
                r"
                INSERT INTO reservations (
                    conversation_id, department_id, doctor_id, patient_name,
                    reserved_at, status, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    reservation.conversation_id,
                    department_id,
                    doctor_id,
                    reservation.patient_name,
                    reservation.reserved_at,
                    reservation.status.as_deref().unwrap_or("confirmed"),
                    current_timestamp(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    // ==================== Embeddings & search ====================

    /// Stores embeddings for several fragments in one transaction,
    /// replacing existing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is stored then.
    pub fn store_embeddings(&mut self, batch: &[(i64, Vec<f32>)], model_name: &str) -> Result<()> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let now = current_timestamp();
        {
            let mut stmt = tx
                .prepare(
                    r"
                    INSERT OR REPLACE INTO chunk_embeddings
                        (chunk_id, embedding, dimensions, model_name, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    ",
                )
                .map_err(StorageError::from)?;
            for (chunk_id, embedding) in batch {
                let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
                stmt.execute(params![
                    chunk_id,
                    bytes,
                    embedding.len() as i64,
                    model_name,
                    now
                ])
                .map_err(StorageError::from)?;
            }
        }
        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    /// Every stored embedding, in chunk-id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id, embedding FROM chunk_embeddings ORDER BY chunk_id")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map([], |row| {
                let bytes: Vec<u8> = row.get(1)?;
                Ok((row.get::<_, i64>(0)?, decode_embedding(&bytes)))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    /// Brute-force nearest-neighbour search over stored embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if embeddings cannot be read.
    pub fn search_similar(&self, query: &[f32], k: usize) -> Result<Vec<(i64, f32)>> {
        Ok(rank_by_similarity(query, &self.all_embeddings()?, k))
    }

    /// BM25 search over fragment text: `(chunk_id, score)`, best first.
    ///
    /// Terms are quoted (so FTS5 operators are literal), prefix-matched (so
    /// "주차장" finds "주차장은") and OR-ed together.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<(i64, f64)>> {
        let fts_query = query
            .split_whitespace()
            .map(|term| term.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
            .filter(|term| !term.is_empty())
            .map(|term| format!("\"{term}\"*"))
            .collect::<Vec<_>>()
            .join(" OR ");
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare(
                r"
                SELECT rowid, -bm25(chunks_fts) AS score
                FROM chunks_fts
                WHERE chunks_fts MATCH ?
                ORDER BY score DESC, rowid
                LIMIT ?
                ",
            )
            .map_err(StorageError::from)?;
        let results = stmt
            .query_map(params![fts_query, limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(results)
    }

    /// Loads fragments by chunk id, preserving the order of `chunk_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn fragments(&self, chunk_ids: &[i64]) -> Result<Vec<Fragment>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
                SELECT c.id, c.document_id, d.name, c.content
                FROM chunks c JOIN documents d ON d.id = c.document_id
                WHERE c.id = ?
                ",
            )
            .map_err(StorageError::from)?;

        let mut fragments = Vec::with_capacity(chunk_ids.len());
        for id in chunk_ids {
            let fragment = stmt
                .query_row(params![id], |row| {
                    Ok(Fragment {
                        chunk_id: row.get(0)?,
                        document_id: row.get(1)?,
                        document_name: row.get(2)?,
                        content: row.get(3)?,
                    })
                })
                .optional()
                .map_err(StorageError::from)?;
            fragments.extend(fragment);
        }
        Ok(fragments)
    }

    /// Number of departments stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn department_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM departments")
    }
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn field_value(value: Value) -> FieldValue {
    match value {
        Value::Text(s) => FieldValue::Text(s),
        Value::Integer(i) => FieldValue::Integer(i),
        Value::Real(f) => FieldValue::Text(f.to_string()),
        Value::Null | Value::Blob(_) => FieldValue::Null,
    }
}

impl Storage for SqliteStorage {
    fn init(&mut self) -> Result<()> {
        if self.is_initialized()? {
            if let Some(found) = self.schema_version()?
                && found > CURRENT_SCHEMA_VERSION
            {
                return Err(StorageError::UnsupportedSchema {
                    found,
                    supported: CURRENT_SCHEMA_VERSION,
                }
                .into());
            }
            return Ok(());
        }

        self.conn
            .execute_batch(SCHEMA_SQL)
            .map_err(StorageError::from)?;
        self.conn
            .execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        Ok(self.count(CHECK_SCHEMA_SQL)? > 0)
    }

    fn add_document(&mut self, document: &Document) -> Result<i64> {
        self.conn
            .execute(
                r"
                INSERT INTO documents (
                    name, source_path, content, content_type, content_hash,
                    size, chunk_count, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    document.name,
                    document.source.as_ref().map(|p| p.to_string_lossy().to_string()),
                    document.content,
                    document.metadata.content_type,
                    document.metadata.content_hash,
                    document.metadata.size as i64,
                    document.metadata.chunk_count.map(|c| c as i64),
                    document.metadata.created_at,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let document = self
            .conn
            .query_row(
                r"
                SELECT id, name, source_path, content, content_type, content_hash,
                       size, chunk_count, created_at
                FROM documents WHERE id = ?
                ",
                params![id],
                |row| {
                    Ok(Document {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        source: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
                        content: row.get(3)?,
                        metadata: DocumentMetadata {
                            content_type: row.get(4)?,
                            content_hash: row.get(5)?,
                            size: row.get::<_, i64>(6)? as usize,
                            chunk_count: row.get::<_, Option<i64>>(7)?.map(|c| c as usize),
                            created_at: row.get(8)?,
                        },
                    })
                },
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(document)
    }

    fn find_document_by_hash(&self, hash: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM documents WHERE content_hash = ? ORDER BY id LIMIT 1",
                params![hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(id)
    }

    fn list_documents(&self) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
                SELECT id, name, source_path, content_type, content_hash,
                       size, chunk_count, created_at
                FROM documents ORDER BY id
                ",
            )
            .map_err(StorageError::from)?;
        let documents = stmt
            .query_map([], |row| {
                Ok(Document {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    source: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
                    content: String::new(),
                    metadata: DocumentMetadata {
                        content_type: row.get(3)?,
                        content_hash: row.get(4)?,
                        size: row.get::<_, i64>(5)? as usize,
                        chunk_count: row.get::<_, Option<i64>>(6)?.map(|c| c as usize),
                        created_at: row.get(7)?,
                    },
                })
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(documents)
    }

    fn delete_document(&mut self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?", params![id])
            .map_err(StorageError::from)?;
        if deleted == 0 {
            return Err(StorageError::DocumentNotFound {
                identifier: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn add_chunks(&mut self, document_id: i64, chunks: &[Chunk]) -> Result<Vec<i64>> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let now = current_timestamp();
        let mut ids = Vec::with_capacity(chunks.len());
        {
            let mut stmt = tx
                .prepare(
                    r"
                    INSERT INTO chunks (
                        document_id, content, byte_start, byte_end, chunk_index, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?)
                    ",
                )
                .map_err(StorageError::from)?;
            for chunk in chunks {
                stmt.execute(params![
                    document_id,
                    chunk.content,
                    chunk.byte_range.start as i64,
                    chunk.byte_range.end as i64,
                    chunk.index as i64,
                    now,
                ])
                .map_err(StorageError::from)?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.execute(
            "UPDATE documents SET chunk_count = ? WHERE id = ?",
            params![chunks.len() as i64, document_id],
        )
        .map_err(StorageError::from)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(ids)
    }

    fn get_chunks(&self, document_id: i64) -> Result<Vec<Chunk>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
                SELECT id, document_id, content, byte_start, byte_end, chunk_index
                FROM chunks WHERE document_id = ? ORDER BY chunk_index
                ",
            )
            .map_err(StorageError::from)?;
        let chunks = stmt
            .query_map(params![document_id], |row| {
                let start = row.get::<_, i64>(3)? as usize;
                let end = row.get::<_, i64>(4)? as usize;
                let mut chunk = Chunk::new(
                    row.get(1)?,
                    row.get(2)?,
                    start..end,
                    row.get::<_, i64>(5)? as usize,
                );
                chunk.id = Some(row.get(0)?);
                Ok(chunk)
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(chunks)
    }

    fn lookup(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        self.ensure_initialized()?;
        let (sql, values) = build_sql(query)?;
        let fields = schema_for(query.entity).fields;

        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;
        let records = stmt
            .query_map(params_from_iter(values), |row| {
                let mut record = Record::new(query.entity, row.get(0)?);
                for (i, (name, _)) in fields.iter().enumerate() {
                    record
                        .fields
                        .insert((*name).to_string(), field_value(row.get(i + 1)?));
                }
                Ok(record)
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(records)
    }

    fn stats(&self) -> Result<StorageStats> {
        self.ensure_initialized()?;
        Ok(StorageStats {
            document_count: self.count("SELECT COUNT(*) FROM documents")?,
            chunk_count: self.count("SELECT COUNT(*) FROM chunks")?,
            embedding_count: self.count("SELECT COUNT(*) FROM chunk_embeddings")?,
            department_count: self.department_count()?,
            doctor_count: self.count("SELECT COUNT(*) FROM doctors WHERE active = 1")?,
            reservation_count: self.count("SELECT COUNT(*) FROM reservations")?,
            schema_version: self.schema_version()?.unwrap_or(0),
            db_size: self
                .path
                .as_ref()
                .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len())),
        })
    }
}
