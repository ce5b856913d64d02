//! Causal edge storage and lookups.
//!
//! Edges are directed `(source, relation, target)` triples with a strength in
//! `[0.0, 1.0]`. Storing the same triple twice refreshes its strength and
//! evidence instead of creating a second edge.

use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::memory::store::write_audit_log;
use crate::memory::temporal::TimeScope;
use crate::memory::types::{CausalEdge, CausalRelation, Memory};
use crate::memory::{fmt_ts, parse_ts, row_to_memory, Conditions, MEMORY_COLUMNS};

/// Result returned from [`add_relationship`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRelationResult {
    /// Id of the created (or refreshed) edge.
    pub id: String,
    /// `true` if this exact (source, target, relation) triple already existed.
    pub deduplicated: bool,
}

const EDGE_COLUMNS: &str =
    "e.id, e.source_id, e.target_id, e.relation, e.strength, e.evidence, e.created_at";

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<CausalEdge> {
    let relation: CausalRelation = row.get::<_, String>(3)?.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    let evidence: String = row.get(5)?;
    Ok(CausalEdge {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        relation,
        strength: row.get(4)?,
        evidence: serde_json::from_str(&evidence).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
    })
}

/// Store a causal edge from `source_id` to `target_id`.
///
/// Both endpoints must exist and `strength` must lie in `[0.0, 1.0]`.
pub(crate) fn add_relationship(
    conn: &mut Connection,
    source_id: &str,
    target_id: &str,
    relation: CausalRelation,
    strength: f64,
    evidence: &[String],
) -> Result<StoreRelationResult> {
    if !(0.0..=1.0).contains(&strength) {
        return Err(Error::InvalidEdge(format!(
            "strength must be between 0.0 and 1.0, got {strength}"
        )));
    }

    let tx = conn.transaction()?;
    validate_endpoint(&tx, source_id)?;
    validate_endpoint(&tx, target_id)?;

    let evidence_json = serde_json::to_string(evidence)?;
    let existing_id: Option<String> = tx
        .query_row(
            "SELECT id FROM causal_edges \
             WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3",
            params![source_id, target_id, relation.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let result = match existing_id {
        Some(id) => {
            tx.execute(
                "UPDATE causal_edges SET strength = ?1, evidence = ?2 WHERE id = ?3",
                params![strength, evidence_json, id],
            )?;
            StoreRelationResult { id, deduplicated: true }
        }
        None => {
            let id = uuid::Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO causal_edges \
                 (id, source_id, target_id, relation, strength, evidence, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    source_id,
                    target_id,
                    relation.as_str(),
                    strength,
                    evidence_json,
                    fmt_ts(chrono::Utc::now()),
                ],
            )?;
            StoreRelationResult { id, deduplicated: false }
        }
    };

    write_audit_log(
        &tx,
        "relate",
        source_id,
        Some(&serde_json::json!({
            "edge_id": result.id,
            "target_id": target_id,
            "relation": relation.as_str(),
            "strength": strength,
            "deduplicated": result.deduplicated,
        })),
    )?;
    tx.commit()?;

    tracing::debug!(
        edge_id = %result.id,
        source_id,
        target_id,
        relation = %relation,
        deduplicated = result.deduplicated,
        "relationship stored"
    );
    Ok(result)
}

fn validate_endpoint(conn: &Connection, memory_id: &str) -> Result<()> {
    let found: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM memories WHERE id = ?1",
        params![memory_id],
        |row| row.get(0),
    )?;
    if found {
        Ok(())
    } else {
        Err(Error::MemoryNotFound(memory_id.to_string()))
    }
}

/// Remove edges from `source_id` to `target_id`, either every relation or just
/// `relation`. Returns how many edges were removed.
pub(crate) fn remove_relationship(
    conn: &Connection,
    source_id: &str,
    target_id: &str,
    relation: Option<CausalRelation>,
) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM causal_edges \
         WHERE source_id = ?1 AND target_id = ?2 AND (?3 IS NULL OR relation = ?3)",
        params![source_id, target_id, relation.map(|r| r.as_str())],
    )?;
    if removed > 0 {
        write_audit_log(
            conn,
            "unrelate",
            source_id,
            Some(&serde_json::json!({
                "target_id": target_id,
                "relation": relation.map(|r| r.as_str()),
                "removed": removed,
            })),
        )?;
    }
    Ok(removed)
}

fn edges_where(
    conn: &Connection,
    column: &str,
    memory_id: &str,
    scope: &TimeScope,
) -> Result<Vec<CausalEdge>> {
    let mut conds = Conditions::new();
    conds.push(format!("e.{column} = ?"), [Value::Text(memory_id.to_string())]);
    scope.restrict_edges(&mut conds);

    let sql = format!(
        "SELECT {EDGE_COLUMNS} FROM causal_edges e {} ORDER BY e.created_at, e.id",
        conds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let edges = stmt
        .query_map(conds.params(), row_to_edge)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

/// Outgoing edges of `memory_id`, oldest first.
pub(crate) fn edges_from(
    conn: &Connection,
    memory_id: &str,
    scope: &TimeScope,
) -> Result<Vec<CausalEdge>> {
    edges_where(conn, "source_id", memory_id, scope)
}

/// Incoming edges of `memory_id`, oldest first.
pub(crate) fn edges_to(
    conn: &Connection,
    memory_id: &str,
    scope: &TimeScope,
) -> Result<Vec<CausalEdge>> {
    edges_where(conn, "target_id", memory_id, scope)
}

/// Memories joined to `memory_id` by an edge in either direction, strongest
/// edge first. Each neighbor appears once.
pub(crate) fn get_related(
    conn: &Connection,
    memory_id: &str,
    relation: Option<CausalRelation>,
    limit: Option<usize>,
    scope: &TimeScope,
) -> Result<Vec<Memory>> {
    let mut conds = Conditions::new();
    conds.push(
        "(e.source_id = ? OR e.target_id = ?) AND m.id <> ?",
        [
            Value::Text(memory_id.to_string()),
            Value::Text(memory_id.to_string()),
            Value::Text(memory_id.to_string()),
        ],
    );
    if let Some(relation) = relation {
        conds.push("e.relation = ?", [Value::Text(relation.as_str().into())]);
    }
    scope.restrict_edges(&mut conds);
    scope.restrict_memories(&mut conds);
    conds.bind(Value::Integer(limit.map_or(-1, |l| l.min(i64::MAX as usize) as i64)));

    let sql = format!(
        "SELECT {MEMORY_COLUMNS} FROM causal_edges e \
         JOIN memories m ON m.id = e.source_id OR m.id = e.target_id \
         {} GROUP BY m.id ORDER BY MAX(e.strength) DESC, m.id LIMIT ?",
        conds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(conds.params(), row_to_memory)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(memories)
}
