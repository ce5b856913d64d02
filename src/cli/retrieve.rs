use anyhow::Result;

use cortex::config::CortexConfig;
use cortex::retrieval::{Intent, RetrievalContext};

/// Rank memories for `focus` and print what fits in `budget` tokens.
pub fn retrieve(
    config: &CortexConfig,
    focus: &str,
    intent: Intent,
    budget: usize,
    json: bool,
) -> Result<()> {
    let store = super::open_store(config)?;
    let ctx = RetrievalContext::new(focus)
        .with_intent(intent)
        .with_max_tokens(budget);
    let result = config.retrieval_engine().retrieve(&store, &ctx)?;

    if json {
        return super::print_json(&result);
    }

    println!(
        "{} of {} candidates, {}/{} tokens",
        result.memories.len(),
        result.candidates,
        result.tokens_used,
        result.budget
    );
    for m in &result.memories {
        println!();
        println!(
            "{} [{}, score {:.3}, {} tokens]",
            m.selection.memory_id, m.selection.level, m.selection.relevance_score, m.selection.tokens
        );
        for line in m.text.lines() {
            println!("  {line}");
        }
    }

    Ok(())
}
