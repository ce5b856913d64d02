pub mod retrieve;
pub mod stats;
pub mod trace;
pub mod validate;

use anyhow::{Context, Result};
use serde::Serialize;

use cortex::config::CortexConfig;
use cortex::memory::store::SqliteStore;

/// Open the configured store.
pub fn open_store(config: &CortexConfig) -> Result<SqliteStore> {
    let db_path = config.resolved_db_path();
    SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
