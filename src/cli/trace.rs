//! CLI `trace` command: walk the causal graph around one memory.

use anyhow::Result;

use cortex::causal::{CausalTraverser, Direction, TraversalOptions};
use cortex::config::CortexConfig;

pub fn trace(
    config: &CortexConfig,
    id: &str,
    direction: Direction,
    options: &TraversalOptions,
    json: bool,
) -> Result<()> {
    let store = super::open_store(config)?;
    let chain = CausalTraverser::new(&store).trace(id, direction, options)?;

    if json {
        return super::print_json(&chain);
    }

    if chain.total_memories == 0 {
        println!("No memory with id {id}");
        return Ok(());
    }

    println!("Causal {} of {}", chain.direction, chain.root_id);
    println!("{}", "=".repeat(50));
    for node in &chain.nodes {
        println!(
            "  {}[{}] {} ({}, path strength {:.2})",
            "  ".repeat(node.depth.saturating_sub(1)),
            node.depth,
            node.memory.summary,
            node.memory.id,
            node.path_strength,
        );
    }
    if chain.nodes.is_empty() {
        println!("  (no connected memories)");
    }
    println!();

    println!("Edges:");
    for edge in &chain.edges {
        println!(
            "  {} --[{} {:.2}]--> {}",
            edge.source_id, edge.relation, edge.strength, edge.target_id
        );
    }
    println!();

    println!("Memories:   {}", chain.total_memories);
    println!("Depth:      {}", chain.max_depth_reached);
    if let Some(confidence) = chain.chain_confidence {
        println!("Confidence: {confidence:.2}");
    }
    if chain.truncated {
        println!("(stopped at the node limit)");
    }
    for missing in &chain.missing {
        println!("Missing endpoint: {missing}");
    }

    Ok(())
}

pub fn narrative(config: &CortexConfig, id: &str, json: bool) -> Result<()> {
    let store = super::open_store(config)?;
    let narrative = CausalTraverser::new(&store).narrative(id)?;

    if json {
        return super::print_json(&narrative);
    }

    println!("{}", narrative.summary);
    for section in &narrative.sections {
        println!();
        println!("{}:", section.title);
        for entry in &section.entries {
            println!("  - {entry}");
        }
    }
    if !narrative.evidence_refs.is_empty() {
        println!();
        println!("Evidence:");
        for evidence in &narrative.evidence_refs {
            println!("  - {evidence}");
        }
    }
    println!();
    println!(
        "Confidence: {:.2} ({})",
        narrative.confidence, narrative.confidence_level
    );

    Ok(())
}
