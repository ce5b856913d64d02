//! Error type for the Cortex store and the components that read through it.
//!
//! Reads of missing ids are not errors (they return `None`, `false` or an empty
//! list). Errors are reserved for integrity violations on write and for a store
//! that cannot be reached.

use thiserror::Error;

use crate::memory::types::ConsolidationStatus;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid memory: {0}")]
    InvalidMemory(String),

    #[error("invalid causal edge: {0}")]
    InvalidEdge(String),

    /// A write referenced a memory that does not exist.
    #[error("memory not found: {0}")]
    MemoryNotFound(String),

    #[error("cannot move consolidation status from {from} to {to}")]
    InvalidTransition {
        from: ConsolidationStatus,
        to: ConsolidationStatus,
    },

    #[error("store lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
