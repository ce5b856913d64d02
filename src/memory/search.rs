//! Filtered memory queries: [`search`] over the `memories` table and
//! [`find_by_link`] over `memory_links`.

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::temporal::TimeScope;
use crate::memory::types::{normalize_topic, Importance, Memory, MemoryKind, MemoryLink};
use crate::memory::{row_to_memory, Conditions, MEMORY_COLUMNS};

// ── Public types ──────────────────────────────────────────────────────────────

/// Conjunctive filter for [`search`]. Empty lists mean "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Match any of these kinds.
    pub kinds: Vec<MemoryKind>,
    pub min_confidence: Option<f64>,
    /// Match any of these importance levels.
    pub importance: Vec<Importance>,
    /// Every tag listed must be present on the memory.
    pub tags: Vec<String>,
    /// Exact match after [`normalize_topic`].
    pub topic: Option<String>,
    pub limit: Option<usize>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn min_confidence(mut self, floor: f64) -> Self {
        self.min_confidence = Some(floor);
        self
    }

    pub fn importance(mut self, levels: impl IntoIterator<Item = Importance>) -> Self {
        self.importance.extend(levels);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn apply(&self, conds: &mut Conditions) {
        if !self.kinds.is_empty() {
            conds.push(
                format!("m.kind IN ({})", placeholders(self.kinds.len())),
                self.kinds.iter().map(|k| Value::Text(k.as_str().into())),
            );
        }
        if let Some(floor) = self.min_confidence {
            conds.push("m.confidence >= ?", [Value::Real(floor)]);
        }
        if !self.importance.is_empty() {
            conds.push(
                format!("m.importance IN ({})", placeholders(self.importance.len())),
                self.importance.iter().map(|i| Value::Text(i.as_str().into())),
            );
        }
        for tag in &self.tags {
            conds.push(
                "EXISTS (SELECT 1 FROM json_each(m.tags) WHERE json_each.value = ?)",
                [Value::Text(tag.clone())],
            );
        }
        if let Some(topic) = &self.topic {
            conds.push("m.topic_key = ?", [Value::Text(normalize_topic(topic))]);
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ── Queries ───────────────────────────────────────────────────────────────────

/// Memories matching `filter` under `scope`, highest confidence first, then
/// newest, then by id.
pub(crate) fn search(
    conn: &Connection,
    filter: &SearchFilter,
    scope: &TimeScope,
) -> Result<Vec<Memory>> {
    let mut conds = Conditions::new();
    filter.apply(&mut conds);
    scope.restrict_memories(&mut conds);

    // SQLite treats a negative LIMIT as "no limit".
    let limit = filter.limit.map_or(-1, |l| l.min(i64::MAX as usize) as i64);
    conds.bind(Value::Integer(limit));

    let sql = format!(
        "SELECT {MEMORY_COLUMNS} FROM memories m {} \
         ORDER BY m.confidence DESC, m.created_at DESC, m.id LIMIT ?",
        conds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(conds.params(), row_to_memory)?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(results = memories.len(), "search");
    Ok(memories)
}

/// Memories carrying `link`, oldest first.
pub(crate) fn find_by_link(
    conn: &Connection,
    link: &MemoryLink,
    scope: &TimeScope,
) -> Result<Vec<Memory>> {
    let mut conds = Conditions::new();
    conds.push(
        "l.link_kind = ? AND l.target = ?",
        [
            Value::Text(link.kind.as_str().into()),
            Value::Text(link.target.clone()),
        ],
    );
    scope.restrict_memories(&mut conds);

    let sql = format!(
        "SELECT {MEMORY_COLUMNS} FROM memories m \
         JOIN memory_links l ON l.memory_id = m.id {} \
         ORDER BY m.created_at, m.id",
        conds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(conds.params(), row_to_memory)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(memories)
}
