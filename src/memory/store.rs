//! The memory store: read/write traits and their SQLite implementation.
//!
//! [`MemoryReader`] is everything the retrieval, causal and validation layers
//! need; it is implemented by [`SqliteStore`] and by every
//! [`ScopedView`](crate::memory::temporal::ScopedView). [`MemoryStore`] adds
//! the write path. Each write runs in a transaction and appends an entry to
//! the `memory_log` audit table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::memory::relations::{self, StoreRelationResult};
use crate::memory::search::SearchFilter;
use crate::memory::stats::{self, StatsResponse};
use crate::memory::temporal::{ScopedView, TimeScope};
use crate::memory::types::{
    normalize_topic, CausalEdge, CausalRelation, Memory, MemoryKind, MemoryLink, MemoryPatch,
};
use crate::memory::{content_json, fmt_ts, row_to_memory, Conditions, MEMORY_COLUMNS};

/// Read side of the store. Missing ids are `Ok(None)` / `Ok(false)` / empty,
/// never an error.
pub trait MemoryReader {
    fn read(&self, id: &str) -> Result<Option<Memory>>;

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.read(id)?.is_some())
    }

    /// Whether `id` is stored at all, ignoring any time scope on this reader.
    fn is_stored(&self, id: &str) -> Result<bool> {
        self.exists(id)
    }

    fn search(&self, filter: &SearchFilter) -> Result<Vec<Memory>>;

    fn find_by_type(&self, kind: MemoryKind) -> Result<Vec<Memory>> {
        self.search(&SearchFilter::new().kind(kind))
    }

    fn find_by_link(&self, link: &MemoryLink) -> Result<Vec<Memory>>;

    fn find_by_file(&self, path: &str) -> Result<Vec<Memory>> {
        self.find_by_link(&MemoryLink::file(path))
    }

    fn find_by_function(&self, name: &str) -> Result<Vec<Memory>> {
        self.find_by_link(&MemoryLink::function(name))
    }

    fn find_by_pattern(&self, pattern_id: &str) -> Result<Vec<Memory>> {
        self.find_by_link(&MemoryLink::pattern(pattern_id))
    }

    fn find_by_constraint(&self, constraint_id: &str) -> Result<Vec<Memory>> {
        self.find_by_link(&MemoryLink::constraint(constraint_id))
    }

    /// Memories on the other end of any edge touching `id`.
    fn get_related(
        &self,
        id: &str,
        relation: Option<CausalRelation>,
        limit: Option<usize>,
    ) -> Result<Vec<Memory>>;

    fn edges_from(&self, id: &str) -> Result<Vec<CausalEdge>>;

    fn edges_to(&self, id: &str) -> Result<Vec<CausalEdge>>;

    fn count(&self) -> Result<u64>;

    fn count_by_type(&self) -> Result<BTreeMap<MemoryKind, u64>>;
}

/// Write side of the store.
pub trait MemoryStore: MemoryReader {
    /// Insert a new memory and return its id.
    fn create(&self, memory: &Memory) -> Result<String>;

    /// Apply `patch` to an existing memory. `Ok(false)` if it does not exist.
    fn update(&self, id: &str, patch: &MemoryPatch) -> Result<bool>;

    /// Delete a memory along with its edges and links.
    fn delete(&self, id: &str) -> Result<bool>;

    fn add_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        relation: CausalRelation,
        strength: f64,
        evidence: &[String],
    ) -> Result<StoreRelationResult>;

    fn remove_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        relation: Option<CausalRelation>,
    ) -> Result<usize>;

    fn add_link(&self, memory_id: &str, link: &MemoryLink) -> Result<()>;

    /// Bump the access counter by one. `Ok(false)` if the memory does not exist.
    fn record_access(&self, id: &str) -> Result<bool>;
}

/// SQLite-backed store behind a single connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = crate::db::open_database(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = crate::db::open_memory_database()?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Re-run schema setup and pending migrations. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        self.with_conn(crate::db::initialize)
    }

    /// Close the underlying connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| Error::Lock(e.to_string()))?;
        conn.close().map_err(|(_, e)| Error::Database(e))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Unscoped read view.
    pub fn view(&self) -> ScopedView<'_> {
        ScopedView::new(self, TimeScope::default())
    }

    /// Read view of what the store knew at `at` (transaction time).
    pub fn as_of(&self, at: DateTime<Utc>) -> ScopedView<'_> {
        ScopedView::new(self, TimeScope::as_of(at))
    }

    /// Read view of what was true at `at` (valid time).
    pub fn valid_at(&self, at: DateTime<Utc>) -> ScopedView<'_> {
        ScopedView::new(self, TimeScope::valid_at(at))
    }

    pub fn stats(&self) -> Result<StatsResponse> {
        self.with_conn(|conn| stats::memory_stats(conn, self.path()))
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Lock(e.to_string()))?;
        f(&conn)
    }

    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| Error::Lock(e.to_string()))?;
        f(&mut conn)
    }
}

impl MemoryReader for SqliteStore {
    fn read(&self, id: &str) -> Result<Option<Memory>> {
        self.view().read(id)
    }

    fn search(&self, filter: &SearchFilter) -> Result<Vec<Memory>> {
        self.view().search(filter)
    }

    fn find_by_link(&self, link: &MemoryLink) -> Result<Vec<Memory>> {
        self.view().find_by_link(link)
    }

    fn get_related(
        &self,
        id: &str,
        relation: Option<CausalRelation>,
        limit: Option<usize>,
    ) -> Result<Vec<Memory>> {
        self.view().get_related(id, relation, limit)
    }

    fn edges_from(&self, id: &str) -> Result<Vec<CausalEdge>> {
        self.view().edges_from(id)
    }

    fn edges_to(&self, id: &str) -> Result<Vec<CausalEdge>> {
        self.view().edges_to(id)
    }

    fn count(&self) -> Result<u64> {
        self.view().count()
    }

    fn count_by_type(&self) -> Result<BTreeMap<MemoryKind, u64>> {
        self.view().count_by_type()
    }
}

impl MemoryStore for SqliteStore {
    fn create(&self, memory: &Memory) -> Result<String> {
        self.with_conn_mut(|conn| insert_memory(conn, memory))
    }

    fn update(&self, id: &str, patch: &MemoryPatch) -> Result<bool> {
        self.with_conn_mut(|conn| update_memory(conn, id, patch))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| delete_memory(conn, id))
    }

    fn add_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        relation: CausalRelation,
        strength: f64,
        evidence: &[String],
    ) -> Result<StoreRelationResult> {
        self.with_conn_mut(|conn| {
            relations::add_relationship(conn, source_id, target_id, relation, strength, evidence)
        })
    }

    fn remove_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        relation: Option<CausalRelation>,
    ) -> Result<usize> {
        self.with_conn(|conn| relations::remove_relationship(conn, source_id, target_id, relation))
    }

    fn add_link(&self, memory_id: &str, link: &MemoryLink) -> Result<()> {
        self.with_conn(|conn| insert_link(conn, memory_id, link))
    }

    fn record_access(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| bump_access(conn, id))
    }
}

// ── Statements ────────────────────────────────────────────────────────────────

/// Read a single memory under `scope`.
pub(crate) fn read_memory(
    conn: &Connection,
    id: &str,
    scope: &TimeScope,
) -> Result<Option<Memory>> {
    let mut conds = Conditions::new();
    conds.push("m.id = ?", [rusqlite::types::Value::Text(id.to_string())]);
    scope.restrict_memories(&mut conds);

    let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories m {}", conds.where_sql());
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(conds.params(), row_to_memory)?;
    Ok(rows.next().transpose()?)
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Validate and insert a new memory row.
fn insert_memory(conn: &mut Connection, memory: &Memory) -> Result<String> {
    memory.validate()?;

    let tx = conn.transaction()?;
    if read_memory(&tx, &memory.id, &TimeScope::default())?.is_some() {
        return Err(Error::InvalidMemory(format!(
            "memory {} already exists",
            memory.id
        )));
    }

    let topic = memory.topic();
    tx.execute(
        "INSERT INTO memories (id, kind, summary, topic, topic_key, confidence, importance, \
         importance_rank, access_count, tags, content, recorded_at, valid_from, valid_to, \
         created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            memory.id,
            memory.kind().as_str(),
            memory.summary,
            topic,
            topic.map(normalize_topic),
            memory.confidence,
            memory.importance.as_str(),
            memory.importance.rank(),
            to_sql_count(memory.access_count),
            serde_json::to_string(&memory.tags)?,
            content_json(&memory.content)?,
            fmt_ts(memory.transaction_time.recorded_at),
            fmt_ts(memory.valid_time.valid_from),
            memory.valid_time.valid_to.map(fmt_ts),
            fmt_ts(memory.created_at),
            fmt_ts(memory.updated_at),
        ],
    )?;
    write_audit_log(
        &tx,
        "create",
        &memory.id,
        Some(&serde_json::json!({"kind": memory.kind().as_str()})),
    )?;
    tx.commit()?;

    tracing::debug!(memory_id = %memory.id, kind = %memory.kind(), "memory created");
    Ok(memory.id.clone())
}

/// Apply a patch. The transaction time is never rewritten.
fn update_memory(conn: &mut Connection, id: &str, patch: &MemoryPatch) -> Result<bool> {
    let tx = conn.transaction()?;
    let Some(mut memory) = read_memory(&tx, id, &TimeScope::default())? else {
        return Ok(false);
    };
    patch.apply(&mut memory)?;

    tx.execute(
        "UPDATE memories SET summary = ?1, confidence = ?2, importance = ?3, \
         importance_rank = ?4, access_count = ?5, tags = ?6, content = ?7, valid_to = ?8, \
         updated_at = ?9 WHERE id = ?10",
        params![
            memory.summary,
            memory.confidence,
            memory.importance.as_str(),
            memory.importance.rank(),
            to_sql_count(memory.access_count),
            serde_json::to_string(&memory.tags)?,
            content_json(&memory.content)?,
            memory.valid_time.valid_to.map(fmt_ts),
            fmt_ts(memory.updated_at),
            id,
        ],
    )?;
    write_audit_log(&tx, "update", id, Some(&serde_json::to_value(patch)?))?;
    tx.commit()?;

    tracing::debug!(memory_id = %id, "memory updated");
    Ok(true)
}

/// Delete a memory and every edge that touches it. Links go by cascade.
fn delete_memory(conn: &mut Connection, id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    let edges_removed = tx.execute(
        "DELETE FROM causal_edges WHERE source_id = ?1 OR target_id = ?1",
        params![id],
    )?;
    let rows = tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
    if rows == 0 {
        // Nothing to delete; dropping the transaction rolls back.
        return Ok(false);
    }
    write_audit_log(
        &tx,
        "delete",
        id,
        Some(&serde_json::json!({"edges_removed": edges_removed})),
    )?;
    tx.commit()?;

    tracing::debug!(memory_id = %id, edges_removed, "memory deleted");
    Ok(true)
}

fn insert_link(conn: &Connection, memory_id: &str, link: &MemoryLink) -> Result<()> {
    let found: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM memories WHERE id = ?1",
        params![memory_id],
        |row| row.get(0),
    )?;
    if !found {
        return Err(Error::MemoryNotFound(memory_id.to_string()));
    }
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO memory_links (memory_id, link_kind, target) VALUES (?1, ?2, ?3)",
        params![memory_id, link.kind.as_str(), link.target],
    )?;
    if inserted > 0 {
        write_audit_log(
            conn,
            "update",
            memory_id,
            Some(&serde_json::json!({"link": link})),
        )?;
    }
    Ok(())
}

fn bump_access(conn: &Connection, id: &str) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE memories SET access_count = access_count + 1 WHERE id = ?1",
        params![id],
    )?;
    if rows > 0 {
        write_audit_log(conn, "update", id, Some(&serde_json::json!({"reason": "access"})))?;
    }
    Ok(rows > 0)
}

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    memory_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, memory_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, memory_id, details_json, fmt_ts(Utc::now())],
    )?;
    Ok(())
}
