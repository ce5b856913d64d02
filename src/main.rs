mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cortex::causal::Direction;
use cortex::config::CortexConfig;
use cortex::retrieval::Intent;

#[derive(Parser)]
#[command(name = "cortex", version, about = "Inspect and query a Cortex memory store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show store statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Trace the causal chain around a memory
    Trace {
        /// Memory id
        id: String,
        /// origins, effects or bidirectional
        #[arg(long, default_value = "origins")]
        direction: Direction,
        /// Maximum hops from the memory
        #[arg(long)]
        max_depth: Option<usize>,
        /// Skip edges weaker than this
        #[arg(long)]
        min_strength: Option<f64>,
        /// Print a narrative of the immediate neighborhood instead
        #[arg(long)]
        narrative: bool,
        #[arg(long)]
        json: bool,
    },
    /// Check memories for contradictions and expiry
    Validate {
        /// Validate a single memory; all memories when omitted
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Rank memories for a focus and fit them into a token budget
    Retrieve {
        /// What the caller is working on
        #[arg(long, default_value = "")]
        focus: String,
        #[arg(long, default_value = "recall")]
        intent: Intent,
        /// Token budget; defaults to the configured value
        #[arg(long)]
        budget: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CortexConfig::load()?;

    // stdout carries command output; logs go to stderr.
    let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }

    match cli.command {
        Command::Stats { json } => cli::stats::stats(&config, json)?,
        Command::Trace {
            id,
            direction,
            max_depth,
            min_strength,
            narrative,
            json,
        } => {
            let mut options = config.traversal_options();
            if let Some(depth) = max_depth {
                options.max_depth = Some(depth);
            }
            if let Some(strength) = min_strength {
                options.min_strength = strength;
            }
            if narrative {
                cli::trace::narrative(&config, &id, json)?;
            } else {
                cli::trace::trace(&config, &id, direction, &options, json)?;
            }
        }
        Command::Validate { id, json } => cli::validate::validate(&config, id.as_deref(), json)?,
        Command::Retrieve {
            focus,
            intent,
            budget,
            json,
        } => {
            let budget = budget.unwrap_or(config.retrieval.default_token_budget);
            cli::retrieve::retrieve(&config, &focus, intent, budget, json)?;
        }
    }

    Ok(())
}
