//! Cortex: long-lived project memory for AI coding assistants.
//!
//! Cortex keeps facts, corrections and causal relationships an assistant has
//! learned about a codebase in a bitemporal SQLite store. Memories come in
//! three kinds:
//!
//! | Kind | Purpose |
//! |------|---------|
//! | **Tribal** | Team conventions, gotchas and warnings, with a severity |
//! | **Episodic** | Single interactions, pending consolidation |
//! | **Semantic** | Consolidated knowledge with evidence counters |
//!
//! Every memory carries two independent timelines: when the store recorded it
//! (transaction time) and when it was true (valid time). Causal edges connect
//! memories by id and may form cycles.
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema and migrations
//! - [`memory`]: memory types, the store traits, search, relationships and
//!   `as_of` / `valid_at` scoped views
//! - [`retrieval`]: relevance scoring, intent boosts and token budgeting
//! - [`causal`]: cycle-safe traversal, chain confidence and narratives
//! - [`validation`]: contradiction and expiry checks
//!
//! # Example
//!
//! ```
//! use cortex::memory::store::{MemoryStore, SqliteStore};
//! use cortex::memory::types::{CausalRelation, Memory, Severity};
//! use cortex::causal::{CausalTraverser, TraversalOptions};
//!
//! let store = SqliteStore::open_in_memory()?;
//! let cause = store.create(&Memory::tribal("ci", "flaky test quarantined", Severity::Warning))?;
//! let effect = store.create(&Memory::semantic("ci", "pipeline is green again"))?;
//! store.add_relationship(&cause, &effect, CausalRelation::Caused, 0.8, &[])?;
//!
//! let chain = CausalTraverser::new(&store).trace_origins(&effect, &TraversalOptions::default())?;
//! assert_eq!(chain.nodes.len(), 1);
//! # Ok::<(), cortex::Error>(())
//! ```

pub mod causal;
pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod retrieval;
pub mod text;
pub mod validation;

pub use error::{Error, Result};
