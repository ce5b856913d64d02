//! Memory engine: types, the store traits and their SQLite implementation,
//! filtered search, causal edges and bitemporal views.

pub mod relations;
pub mod search;
pub mod stats;
pub mod store;
pub mod temporal;
pub mod types;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;

use types::{
    EpisodicContent, Importance, Memory, MemoryContent, MemoryKind, SemanticContent,
    TransactionTime, TribalContent, ValidTime,
};

/// Columns selected for a full [`Memory`] row, in the order [`row_to_memory`] reads them.
pub(crate) const MEMORY_COLUMNS: &str = "m.id, m.kind, m.summary, m.confidence, m.importance, \
     m.access_count, m.tags, m.content, m.recorded_at, m.valid_from, m.valid_to, \
     m.created_at, m.updated_at";

/// Fixed-width RFC 3339 in UTC, so lexical order in SQL is chronological.
pub(crate) fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_err(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn json_col<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| conversion_err(idx, e))
}

/// Map a row selected with [`MEMORY_COLUMNS`] into a [`Memory`].
pub(crate) fn row_to_memory(row: &Row<'_>) -> rusqlite::Result<Memory> {
    let kind: MemoryKind = row
        .get::<_, String>(1)?
        .parse()
        .map_err(|e: String| conversion_err(1, e))?;
    let importance: Importance = row
        .get::<_, String>(4)?
        .parse()
        .map_err(|e: String| conversion_err(4, e))?;

    let raw_content: String = row.get(7)?;
    let content = match kind {
        MemoryKind::Tribal => MemoryContent::Tribal(json_col::<TribalContent>(7, &raw_content)?),
        MemoryKind::Episodic => {
            MemoryContent::Episodic(json_col::<EpisodicContent>(7, &raw_content)?)
        }
        MemoryKind::Semantic => {
            MemoryContent::Semantic(json_col::<SemanticContent>(7, &raw_content)?)
        }
    };

    let valid_to: Option<String> = row.get(10)?;

    Ok(Memory {
        id: row.get(0)?,
        summary: row.get(2)?,
        confidence: row.get(3)?,
        importance,
        access_count: row.get::<_, i64>(5)?.max(0) as u64,
        tags: json_col(6, &row.get::<_, String>(6)?)?,
        transaction_time: TransactionTime {
            recorded_at: parse_ts(8, &row.get::<_, String>(8)?)?,
        },
        valid_time: ValidTime {
            valid_from: parse_ts(9, &row.get::<_, String>(9)?)?,
            valid_to: valid_to.as_deref().map(|s| parse_ts(10, s)).transpose()?,
        },
        created_at: parse_ts(11, &row.get::<_, String>(11)?)?,
        updated_at: parse_ts(12, &row.get::<_, String>(12)?)?,
        content,
    })
}

/// Serialize only the kind-specific payload for the `content` column.
pub(crate) fn content_json(content: &MemoryContent) -> serde_json::Result<String> {
    match content {
        MemoryContent::Tribal(t) => serde_json::to_string(t),
        MemoryContent::Episodic(e) => serde_json::to_string(e),
        MemoryContent::Semantic(s) => serde_json::to_string(s),
    }
}

/// AND-joined WHERE clauses with positional (`?`) parameters, built up by
/// filters and time scopes.
#[derive(Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a clause whose `?` placeholders are bound, in order, to `values`.
    pub(crate) fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(values);
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Bind an extra trailing value (e.g. a LIMIT) after the clause parameters.
    pub(crate) fn bind(&mut self, value: Value) {
        self.params.push(value);
    }

    pub(crate) fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.params.iter())
    }
}
