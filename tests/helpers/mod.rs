#![allow(dead_code)]

use chrono::{DateTime, Utc};
use cortex::memory::store::{MemoryStore, SqliteStore};
use cortex::memory::types::{CausalRelation, Memory};

/// Open a fresh in-memory store with schema and migrations applied.
pub fn test_store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

/// Insert a semantic memory and return its id.
pub fn insert_semantic(store: &SqliteStore, topic: &str, knowledge: &str) -> String {
    store.create(&Memory::semantic(topic, knowledge)).unwrap()
}

/// Insert a semantic memory recorded and valid from `at`.
pub fn insert_at(store: &SqliteStore, knowledge: &str, at: DateTime<Utc>) -> String {
    let memory = Memory::semantic("history", knowledge)
        .recorded_at(at)
        .valid_between(at, None);
    store.create(&memory).unwrap()
}

/// Insert `n` unrelated memories, returning their ids in insertion order.
pub fn insert_nodes(store: &SqliteStore, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| insert_semantic(store, &format!("node {i}"), &format!("fact number {i}")))
        .collect()
}

/// `caused` edge with the given strength.
pub fn link(store: &SqliteStore, source: &str, target: &str, strength: f64) {
    store
        .add_relationship(source, target, CausalRelation::Caused, strength, &[])
        .unwrap();
}

/// Link consecutive ids into a chain: ids[0] -> ids[1] -> ...
pub fn chain(store: &SqliteStore, ids: &[String], strength: f64) {
    for pair in ids.windows(2) {
        link(store, &pair[0], &pair[1], strength);
    }
}
