//! Bitemporal scoping.
//!
//! A [`TimeScope`] restricts reads along either timeline: `recorded_by` hides
//! anything the store learned after that instant (transaction time), and
//! `valid_at` hides memories whose valid interval excludes that instant.
//! [`ScopedView`] carries a scope and answers every [`MemoryReader`] query
//! through it, without touching any shared store state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use super::fmt_ts;
use super::search::SearchFilter;
use super::store::{MemoryReader, SqliteStore};
use super::types::{CausalEdge, CausalRelation, Memory, MemoryKind, MemoryLink};
use super::Conditions;
use crate::error::Result;

/// Instants a read is scoped to. The default scope restricts nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeScope {
    /// Transaction-time ceiling (`asOf`).
    pub recorded_by: Option<DateTime<Utc>>,
    /// Valid-time instant (`validAt`).
    pub valid_at: Option<DateTime<Utc>>,
}

impl TimeScope {
    pub fn as_of(at: DateTime<Utc>) -> Self {
        Self { recorded_by: Some(at), valid_at: None }
    }

    pub fn valid_at(at: DateTime<Utc>) -> Self {
        Self { recorded_by: None, valid_at: Some(at) }
    }

    pub fn is_unscoped(&self) -> bool {
        self.recorded_by.is_none() && self.valid_at.is_none()
    }

    /// Whether `memory` is visible under this scope.
    pub fn admits(&self, memory: &Memory) -> bool {
        self.recorded_by.map_or(true, |t| memory.is_recorded_by(t))
            && self.valid_at.map_or(true, |t| memory.is_valid_at(t))
    }

    /// Add the scope's clauses for the `memories` table aliased as `m`.
    pub(crate) fn restrict_memories(&self, conds: &mut Conditions) {
        if let Some(t) = self.recorded_by {
            conds.push("m.recorded_at <= ?", [Value::Text(fmt_ts(t))]);
        }
        if let Some(t) = self.valid_at {
            let at = fmt_ts(t);
            conds.push(
                "m.valid_from <= ? AND (m.valid_to IS NULL OR m.valid_to >= ?)",
                [Value::Text(at.clone()), Value::Text(at)],
            );
        }
    }

    /// Add the scope's clauses for the `causal_edges` table aliased as `e`.
    /// Edges only live on the transaction timeline.
    pub(crate) fn restrict_edges(&self, conds: &mut Conditions) {
        if let Some(t) = self.recorded_by {
            conds.push("e.created_at <= ?", [Value::Text(fmt_ts(t))]);
        }
    }
}

/// Read-only view of a [`SqliteStore`] pinned to a [`TimeScope`].
///
/// Views compose: `store.as_of(t1).valid_at(t2)` applies both. Calling the
/// same axis twice replaces that axis' instant.
#[derive(Clone, Copy)]
pub struct ScopedView<'a> {
    store: &'a SqliteStore,
    scope: TimeScope,
}

impl<'a> ScopedView<'a> {
    pub(crate) fn new(store: &'a SqliteStore, scope: TimeScope) -> Self {
        Self { store, scope }
    }

    pub fn scope(&self) -> TimeScope {
        self.scope
    }

    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.scope.recorded_by = Some(at);
        self
    }

    pub fn valid_at(mut self, at: DateTime<Utc>) -> Self {
        self.scope.valid_at = Some(at);
        self
    }
}

impl MemoryReader for ScopedView<'_> {
    fn read(&self, id: &str) -> Result<Option<Memory>> {
        self.store.with_conn(|c| super::store::read_memory(c, id, &self.scope))
    }

    fn is_stored(&self, id: &str) -> Result<bool> {
        self.store.exists(id)
    }

    fn search(&self, filter: &SearchFilter) -> Result<Vec<Memory>> {
        self.store.with_conn(|c| super::search::search(c, filter, &self.scope))
    }

    fn find_by_link(&self, link: &MemoryLink) -> Result<Vec<Memory>> {
        self.store.with_conn(|c| super::search::find_by_link(c, link, &self.scope))
    }

    fn get_related(
        &self,
        id: &str,
        relation: Option<CausalRelation>,
        limit: Option<usize>,
    ) -> Result<Vec<Memory>> {
        self.store
            .with_conn(|c| super::relations::get_related(c, id, relation, limit, &self.scope))
    }

    fn edges_from(&self, id: &str) -> Result<Vec<CausalEdge>> {
        self.store.with_conn(|c| super::relations::edges_from(c, id, &self.scope))
    }

    fn edges_to(&self, id: &str) -> Result<Vec<CausalEdge>> {
        self.store.with_conn(|c| super::relations::edges_to(c, id, &self.scope))
    }

    fn count(&self) -> Result<u64> {
        self.store.with_conn(|c| super::stats::count(c, &self.scope))
    }

    fn count_by_type(&self) -> Result<BTreeMap<MemoryKind, u64>> {
        self.store.with_conn(|c| super::stats::count_by_type(c, &self.scope))
    }
}
