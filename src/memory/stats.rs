use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::memory::temporal::TimeScope;
use crate::memory::types::{Importance, MemoryKind};
use crate::memory::{fmt_ts, Conditions};

/// Store-wide statistics for the `stats` command.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_memories: u64,
    pub by_kind: BTreeMap<String, u64>,
    pub by_importance: BTreeMap<String, u64>,
    pub causal_edges: u64,
    pub links: u64,
    pub average_confidence: f64,
    /// Memories whose valid interval has already closed.
    pub expired_memories: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_memory: Option<String>,
}

/// Number of memories visible under `scope`.
pub(crate) fn count(conn: &Connection, scope: &TimeScope) -> Result<u64> {
    let mut conds = Conditions::new();
    scope.restrict_memories(&mut conds);
    let sql = format!("SELECT COUNT(*) FROM memories m {}", conds.where_sql());
    let n: i64 = conn.query_row(&sql, conds.params(), |row| row.get(0))?;
    Ok(n as u64)
}

/// Per-kind counts under `scope`. Every kind is present, zero or not.
pub(crate) fn count_by_type(
    conn: &Connection,
    scope: &TimeScope,
) -> Result<BTreeMap<MemoryKind, u64>> {
    let mut conds = Conditions::new();
    scope.restrict_memories(&mut conds);
    let sql = format!(
        "SELECT m.kind, COUNT(*) FROM memories m {} GROUP BY m.kind",
        conds.where_sql()
    );

    let mut map: BTreeMap<MemoryKind, u64> = MemoryKind::ALL.iter().map(|k| (*k, 0)).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(conds.params(), |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (kind, n) in rows {
        match kind.parse::<MemoryKind>() {
            Ok(kind) => {
                map.insert(kind, n as u64);
            }
            Err(e) => tracing::warn!(error = %e, "skipping unknown memory kind"),
        }
    }
    Ok(map)
}

/// Compute store statistics. `db_path` is used for the file size; pass `None`
/// for in-memory databases.
pub fn memory_stats(conn: &Connection, db_path: Option<&Path>) -> Result<StatsResponse> {
    let scope = TimeScope::default();
    let total_memories = count(conn, &scope)?;
    let by_kind = count_by_type(conn, &scope)?
        .into_iter()
        .map(|(k, n)| (k.as_str().to_string(), n))
        .collect();

    let mut by_importance: BTreeMap<String, u64> = Importance::ALL
        .iter()
        .map(|i| (i.as_str().to_string(), 0))
        .collect();
    {
        let mut stmt =
            conn.prepare("SELECT importance, COUNT(*) FROM memories GROUP BY importance")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (level, n) in rows {
            by_importance.insert(level, n as u64);
        }
    }

    let causal_edges: i64 =
        conn.query_row("SELECT COUNT(*) FROM causal_edges", [], |row| row.get(0))?;
    let links: i64 = conn.query_row("SELECT COUNT(*) FROM memory_links", [], |row| row.get(0))?;
    let average_confidence: Option<f64> =
        conn.query_row("SELECT AVG(confidence) FROM memories", [], |row| row.get(0))?;
    let expired: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE valid_to IS NOT NULL AND valid_to < ?1",
        [fmt_ts(chrono::Utc::now())],
        |row| row.get(0),
    )?;
    let (oldest_memory, newest_memory): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(recorded_at), MAX(recorded_at) FROM memories",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_memories,
        by_kind,
        by_importance,
        causal_edges: causal_edges as u64,
        links: links as u64,
        average_confidence: average_confidence.unwrap_or(0.0),
        expired_memories: expired as u64,
        db_size_bytes,
        oldest_memory,
        newest_memory,
    })
}
