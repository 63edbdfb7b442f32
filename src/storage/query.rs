//! Parameterized structured queries.
//!
//! A [`RecordQuery`] names an entity, a list of filters and a row limit.
//! Field names are checked against a per-entity allow-list before any SQL is
//! built, and every value is bound as a parameter.

use crate::core::{Entity, FieldValue};
use crate::error::{Result, StorageError};
use rusqlite::types::Value;

/// Upper bound on rows returned by a single lookup.
pub const MAX_LOOKUP_LIMIT: usize = 50;

/// One filter criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Field equals a value.
    Equals {
        /// Field name.
        field: String,
        /// Expected value.
        value: FieldValue,
    },
    /// Field value occurs as a substring of `text` (e.g. a department name
    /// mentioned in the user's message).
    MentionedIn {
        /// Field name.
        field: String,
        /// Text searched for the field value.
        text: String,
    },
    /// A symptom keyword of the department occurs in `text`.
    KeywordIn {
        /// Text searched for keywords.
        text: String,
    },
}

/// A bounded structured query against one entity.
///
/// ```
/// use medchat_rs::core::Entity;
/// use medchat_rs::storage::RecordQuery;
///
/// let query = RecordQuery::new(Entity::Doctors)
///     .mentioned_in("department", "내과 의료진 알려주세요")
///     .limit(5);
/// assert_eq!(query.limit, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Target entity.
    pub entity: Entity,
    /// Criteria, combined with AND.
    pub filters: Vec<Filter>,
    /// Maximum rows, clamped to [`MAX_LOOKUP_LIMIT`].
    pub limit: usize,
}

impl RecordQuery {
    /// Query over every row of `entity`, up to the default limit.
    #[must_use]
    pub const fn new(entity: Entity) -> Self {
        Self {
            entity,
            filters: Vec::new(),
            limit: 10,
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn equals(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Equals {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Adds a "value mentioned in text" filter.
    #[must_use]
    pub fn mentioned_in(mut self, field: &str, text: &str) -> Self {
        self.filters.push(Filter::MentionedIn {
            field: field.to_string(),
            text: text.to_string(),
        });
        self
    }

    /// Adds a symptom-keyword filter.
    #[must_use]
    pub fn keyword_in(mut self, text: &str) -> Self {
        self.filters.push(Filter::KeywordIn {
            text: text.to_string(),
        });
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Limit after clamping.
    #[must_use]
    pub fn bounded_limit(&self) -> usize {
        self.limit.min(MAX_LOOKUP_LIMIT)
    }
}

/// SQL shape of one entity.
pub(crate) struct EntitySchema {
    /// `SELECT ... FROM ... [JOIN ...]`, selecting the row id first and
    /// then every allowed field in `fields` order.
    pub select: &'static str,
    /// Always-applied condition.
    pub base_where: Option<&'static str>,
    /// Allowed field names and the SQL expression behind each.
    pub fields: &'static [(&'static str, &'static str)],
    /// Keyword subquery, for entities that support [`Filter::KeywordIn`].
    pub keyword_clause: Option<&'static str>,
    /// Stable row order.
    pub order_by: &'static str,
}

const DEPARTMENTS: EntitySchema = EntitySchema {
    select: "SELECT d.id, d.name, d.code, d.description, d.phone, d.location FROM departments d",
    base_where: None,
    fields: &[
        ("name", "d.name"),
        ("code", "d.code"),
        ("description", "d.description"),
        ("phone", "d.phone"),
        ("location", "d.location"),
    ],
    keyword_clause: Some(
        "EXISTS (SELECT 1 FROM department_keywords k \
         WHERE k.department_id = d.id AND instr(?, k.keyword) > 0)",
    ),
    order_by: "d.id",
};

const DOCTORS: EntitySchema = EntitySchema {
    select: "SELECT doc.id, doc.name, dep.name, doc.title, doc.specialty, doc.schedule \
             FROM doctors doc JOIN departments dep ON dep.id = doc.department_id",
    base_where: Some("doc.active = 1"),
    fields: &[
        ("name", "doc.name"),
        ("department", "dep.name"),
        ("title", "doc.title"),
        ("specialty", "doc.specialty"),
        ("schedule", "doc.schedule"),
    ],
    keyword_clause: None,
    order_by: "doc.id",
};

const RESERVATIONS: EntitySchema = EntitySchema {
    select: "SELECT r.id, r.conversation_id, dep.name, doc.name, r.patient_name, r.reserved_at, r.status \
             FROM reservations r \
             JOIN departments dep ON dep.id = r.department_id \
             LEFT JOIN doctors doc ON doc.id = r.doctor_id",
    base_where: None,
    fields: &[
        ("conversation_id", "r.conversation_id"),
        ("department", "dep.name"),
        ("doctor", "doc.name"),
        ("patient_name", "r.patient_name"),
        ("reserved_at", "r.reserved_at"),
        ("status", "r.status"),
    ],
    keyword_clause: None,
    order_by: "r.reserved_at, r.id",
};

pub(crate) const fn schema_for(entity: Entity) -> &'static EntitySchema {
    match entity {
        Entity::Departments => &DEPARTMENTS,
        Entity::Doctors => &DOCTORS,
        Entity::Reservations => &RESERVATIONS,
    }
}

/// Field names a query may reference for `entity`.
#[must_use]
pub fn allowed_fields(entity: Entity) -> Vec<&'static str> {
    schema_for(entity).fields.iter().map(|(name, _)| *name).collect()
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Boolean(b) => Value::Integer(i64::from(*b)),
        FieldValue::Null => Value::Null,
    }
}

/// Builds the SQL text and bound parameters for `query`.
///
/// # Errors
///
/// Returns [`StorageError::UnknownField`] if a filter names a field outside
/// the entity's allow-list (or a keyword filter targets an entity without
/// keywords).
pub(crate) fn build_sql(query: &RecordQuery) -> Result<(String, Vec<Value>)> {
    let schema = schema_for(query.entity);
    let unknown = |field: &str| StorageError::UnknownField {
        entity: query.entity.to_string(),
        field: field.to_string(),
    };
    let column = |field: &str| {
        schema
            .fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, expr)| *expr)
            .ok_or_else(|| unknown(field))
    };

    let mut clauses: Vec<String> = schema.base_where.iter().map(|s| (*s).to_string()).collect();
    let mut params = Vec::new();

    for filter in &query.filters {
        match filter {
            Filter::Equals { field, value } => {
                let expr = column(field)?;
                if *value == FieldValue::Null {
                    clauses.push(format!("{expr} IS NULL"));
                } else {
                    clauses.push(format!("{expr} = ?"));
                    params.push(to_sql_value(value));
                }
            }
            Filter::MentionedIn { field, text } => {
                let expr = column(field)?;
                clauses.push(format!("(length({expr}) > 0 AND instr(?, {expr}) > 0)"));
                params.push(Value::Text(text.clone()));
            }
            Filter::KeywordIn { text } => {
                let clause = schema.keyword_clause.ok_or_else(|| unknown("keywords"))?;
                clauses.push(clause.to_string());
                params.push(Value::Text(text.clone()));
            }
        }
    }

    let mut sql = schema.select.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(schema.order_by);
    sql.push_str(" LIMIT ?");
    #[allow(clippy::cast_possible_wrap)]
    params.push(Value::Integer(query.bounded_limit() as i64));

    Ok((sql, params))
}
