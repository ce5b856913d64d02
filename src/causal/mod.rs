//! Read-only reasoning over causal edges: chain traversal, neighbor lookup
//! and narratives.

pub mod narrative;
pub mod traversal;

pub use narrative::{CausalNarrative, ConfidenceLevel, NarrativeSection, SectionKind};
pub use traversal::{CausalTraverser, Chain, ChainNode, Direction, Neighbors, TraversalOptions};
