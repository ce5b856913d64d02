use anyhow::{bail, Result};

use cortex::config::CortexConfig;
use cortex::memory::store::MemoryReader;
use cortex::validation::{ValidationReport, Validator};

/// Validate one memory, or every memory when `id` is `None`. Read-only.
pub fn validate(config: &CortexConfig, id: Option<&str>, json: bool) -> Result<()> {
    let store = super::open_store(config)?;
    let validator = Validator::new(&store)
        .with_contradiction_detector(config.contradiction_detector())
        .with_temporal_validator(config.temporal_validator());

    let report = match id {
        Some(id) => {
            let Some(memory) = store.read(id)? else {
                bail!("memory not found: {id}");
            };
            ValidationReport {
                scanned: 1,
                issues: validator.validate(&memory)?,
            }
        }
        None => validator.scan()?,
    };

    if json {
        return super::print_json(&report);
    }

    println!("Validated {} memories", report.scanned);
    if report.issues.is_empty() {
        println!("No issues found.");
        return Ok(());
    }
    println!();
    for issue in &report.issues {
        println!("  [{}] {}: {}", issue.kind, issue.memory_id, issue.message);
    }
    Ok(())
}
