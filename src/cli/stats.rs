use anyhow::Result;

use cortex::config::CortexConfig;
use cortex::memory::types::{Importance, MemoryKind};

/// Display store statistics in the terminal.
pub fn stats(config: &CortexConfig, json: bool) -> Result<()> {
    let store = super::open_store(config)?;
    let response = store.stats()?;

    if json {
        return super::print_json(&response);
    }

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total memories:      {}", response.total_memories);
    println!("  Expired:             {}", response.expired_memories);
    println!("  Average confidence:  {:.2}", response.average_confidence);
    println!();

    println!("By Kind:");
    for kind in MemoryKind::ALL {
        let count = response.by_kind.get(kind.as_str()).copied().unwrap_or(0);
        println!("  {:<12} {}", kind, count);
    }
    println!();

    println!("By Importance:");
    for level in Importance::ALL {
        let count = response.by_importance.get(level.as_str()).copied().unwrap_or(0);
        println!("  {:<12} {}", level, count);
    }
    println!();

    println!("Causal edges:          {}", response.causal_edges);
    println!("Code links:            {}", response.links);
    println!("Database size:         {} bytes", response.db_size_bytes);

    if let Some(ref oldest) = response.oldest_memory {
        println!("Oldest memory:         {oldest}");
    }
    if let Some(ref newest) = response.newest_memory {
        println!("Newest memory:         {newest}");
    }

    Ok(())
}
