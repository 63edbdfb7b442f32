//! Async adapter from [`SqliteStorage`] to [`ContextStore`].
//!
//! `rusqlite` is blocking, so every call runs on tokio's blocking pool and
//! holds the connection lock only inside that task. Dropping the returned
//! future (e.g. on timeout) never leaves the lock held by the caller.

use crate::core::{Entity, FieldValue, Fragment, Record};
use crate::error::{Result, StorageError};
use crate::storage::query::{Filter, RecordQuery};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{ContextStore, Storage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Context store over a shared `SQLite` knowledge base.
///
/// When the departments table is empty, department lookups are answered
/// from a department list parsed from the hospital guide (see
/// [`crate::storage::parse_department_list`]).
#[derive(Debug, Clone)]
pub struct SqliteContextStore {
    storage: Arc<Mutex<SqliteStorage>>,
    department_list: Arc<Vec<String>>,
}

impl SqliteContextStore {
    /// Wraps an initialized storage.
    #[must_use]
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            department_list: Arc::new(Vec::new()),
        }
    }

    /// Sets the department names used while the table is empty.
    #[must_use]
    pub fn with_department_list(mut self, names: Vec<String>) -> Self {
        self.department_list = Arc::new(names);
        self
    }

    async fn with_storage<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStorage) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            let guard = storage
                .lock()
                .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Database(format!("storage task failed: {e}")))?
    }
}

/// Answers a department query from the fallback name list.
///
/// Only the `name` field is known; filters on anything else match nothing.
fn department_list_records(names: &[String], query: &RecordQuery) -> Vec<Record> {
    let matches = |name: &str| {
        query.filters.iter().all(|filter| match filter {
            Filter::Equals { field, value } => {
                field == "name" && *value == FieldValue::Text(name.to_string())
            }
            Filter::MentionedIn { field, text } => field == "name" && text.contains(name),
            Filter::KeywordIn { .. } => false,
        })
    };

    names
        .iter()
        .enumerate()
        .filter(|(_, name)| matches(name))
        .take(query.bounded_limit())
        .map(|(i, name)| {
            #[allow(clippy::cast_possible_wrap)]
            let key = i as i64 + 1;
            Record::new(Entity::Departments, key).with_field("name", name.as_str())
        })
        .collect()
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn lookup(&self, query: RecordQuery) -> Result<Vec<Record>> {
        let department_list = Arc::clone(&self.department_list);
        self.with_storage(move |storage| {
            let records = storage.lookup(&query)?;
            if records.is_empty()
                && query.entity == Entity::Departments
                && !department_list.is_empty()
                && storage.department_count()? == 0
            {
                debug!("departments table empty, using department list");
                return Ok(department_list_records(&department_list, &query));
            }
            Ok(records)
        })
        .await
    }

    async fn search(&self, embedding: Vec<f32>, k: usize) -> Result<Vec<(i64, f32)>> {
        self.with_storage(move |storage| storage.search_similar(&embedding, k))
            .await
    }

    async fn fragments(&self, chunk_ids: Vec<i64>) -> Result<Vec<Fragment>> {
        self.with_storage(move |storage| storage.fragments(&chunk_ids))
            .await
    }

    async fn search_text(&self, query: String, k: usize) -> Result<Vec<(i64, f64)>> {
        self.with_storage(move |storage| storage.search_fts(&query, k))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewDepartment;

    fn store() -> SqliteContextStore {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        SqliteContextStore::new(storage)
    }

    #[tokio::test]
    async fn test_department_list_used_when_table_empty() {
        let store = store().with_department_list(vec!["내과".to_string(), "외과".to_string()]);
        let all = store.lookup(RecordQuery::new(Entity::Departments)).await.unwrap();
        assert_eq!(all.len(), 2);

        let named = store
            .lookup(RecordQuery::new(Entity::Departments).mentioned_in("name", "내과 위치"))
            .await
            .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].text("name"), Some("내과"));
    }

    #[tokio::test]
    async fn test_table_wins_over_department_list() {
        let store = store().with_department_list(vec!["내과".to_string()]);
        {
            let mut guard = store.storage.lock().unwrap();
            guard.upsert_department(&NewDepartment::named("피부과")).unwrap();
        }
        let all = store.lookup(RecordQuery::new(Entity::Departments)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text("name"), Some("피부과"));
    }

    #[tokio::test]
    async fn test_unknown_field_is_error() {
        let store = store();
        let result = store
            .lookup(RecordQuery::new(Entity::Doctors).equals("password", "x"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let store = store();
        assert!(store.search(vec![1.0, 0.0], 5).await.unwrap().is_empty());
        assert!(store.search_text("주차".to_string(), 5).await.unwrap().is_empty());
    }
}
