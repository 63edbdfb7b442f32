//! Retrieved context: structured records and document fragments.
//!
//! Every item carries a relevance score and a stable identifier. A retrieval
//! is always presented score-descending with ties ordered by identifier, so
//! the same inputs produce the same sequence (and the same cache fingerprint).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Score given to exact structured matches.
pub const EXACT_MATCH_SCORE: f32 = 1.0;

/// Structured entity tables exposed by the context store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// Hospital departments.
    Departments,
    /// Active doctors.
    Doctors,
    /// Reservations keyed by conversation.
    Reservations,
}

impl Entity {
    /// Table name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Departments => "departments",
            Self::Doctors => "doctors",
            Self::Reservations => "reservations",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of a structured record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// Missing value.
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => f.write_str("-"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A row from a structured entity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Source table.
    pub entity: Entity,
    /// Row id.
    pub key: i64,
    /// Column values by name.
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub const fn new(entity: Entity, key: i64) -> Self {
        Self {
            entity,
            key,
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field (builder style).
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Returns a text field, if present and textual.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// One-line rendering used in prompts: `name=value; name=value`.
    ///
    /// Null and empty text fields are skipped.
    #[must_use]
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .filter(|(_, value)| match value {
                FieldValue::Null => false,
                FieldValue::Text(s) => !s.is_empty(),
                _ => true,
            })
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A fragment of an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Chunk id in the vector index (monotonic insertion order).
    pub chunk_id: i64,
    /// Owning document.
    pub document_id: i64,
    /// Document name, when known.
    pub document_name: Option<String>,
    /// Fragment text.
    pub content: String,
}

/// Stable identifier of a context item.
///
/// Ordering is total: records sort before fragments, then by entity and key,
/// fragments by chunk id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextItemId {
    /// Structured record.
    Record {
        /// Source table.
        entity: Entity,
        /// Row id.
        key: i64,
    },
    /// Document fragment.
    Fragment {
        /// Chunk id.
        chunk_id: i64,
    },
}

impl fmt::Display for ContextItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record { entity, key } => write!(f, "record:{entity}:{key}"),
            Self::Fragment { chunk_id } => write!(f, "fragment:{chunk_id}"),
        }
    }
}

/// Payload of a context item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextSource {
    /// Structured record.
    Record(Record),
    /// Document fragment.
    Fragment(Fragment),
}

/// A unit of retrieved information with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Relevance score (higher is better).
    pub score: f32,
    /// Record or fragment.
    pub source: ContextSource,
}

impl ContextItem {
    /// Wraps a structured record with exact-match score.
    #[must_use]
    pub const fn record(record: Record) -> Self {
        Self {
            score: EXACT_MATCH_SCORE,
            source: ContextSource::Record(record),
        }
    }

    /// Wraps a fragment with its similarity score.
    #[must_use]
    pub const fn fragment(fragment: Fragment, score: f32) -> Self {
        Self {
            score,
            source: ContextSource::Fragment(fragment),
        }
    }

    /// Stable identifier.
    #[must_use]
    pub const fn id(&self) -> ContextItemId {
        match &self.source {
            ContextSource::Record(r) => ContextItemId::Record {
                entity: r.entity,
                key: r.key,
            },
            ContextSource::Fragment(f) => ContextItemId::Fragment {
                chunk_id: f.chunk_id,
            },
        }
    }

    /// Text placed into the prompt for this item.
    #[must_use]
    pub fn prompt_text(&self) -> String {
        match &self.source {
            ContextSource::Record(r) => format!("[{}] {}", r.entity, r.render()),
            ContextSource::Fragment(f) => match &f.document_name {
                Some(name) => format!("[{name}] {}", f.content.trim()),
                None => f.content.trim().to_string(),
            },
        }
    }
}

/// Orders two scores descending, with NaN treated as the lowest score.
fn score_desc(a: f32, b: f32) -> Ordering {
    let a = if a.is_nan() { f32::NEG_INFINITY } else { a };
    let b = if b.is_nan() { f32::NEG_INFINITY } else { b };
    b.total_cmp(&a)
}

/// Sorts items by descending score (ties by stable id), drops duplicate ids
/// and keeps at most `k`.
pub fn rank_items(items: &mut Vec<ContextItem>, k: usize) {
    items.sort_by(|a, b| score_desc(a.score, b.score).then_with(|| a.id().cmp(&b.id())));
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.id()));
    items.truncate(k);
}
