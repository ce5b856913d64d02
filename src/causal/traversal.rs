//! Breadth-first traversal of the causal graph.
//!
//! Every traversal keeps a visited set, so cycles are walked once and never
//! re-expanded. Edges whose far end is not in the store are kept in the
//! result as structural facts but the missing memory is never dereferenced or
//! expanded. Through a scoped view, edges leading to a stored memory that is
//! outside the scope are left out of the chain entirely.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::memory::store::MemoryReader;
use crate::memory::types::{CausalEdge, Memory};

/// Lower bound for a reported chain confidence.
const MIN_CHAIN_CONFIDENCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Against edge direction: what led to the root.
    Origins,
    /// Along edge direction: what the root led to.
    Effects,
    Bidirectional,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Origins => "origins",
            Self::Effects => "effects",
            Self::Bidirectional => "bidirectional",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "origins" => Ok(Self::Origins),
            "effects" => Ok(Self::Effects),
            "bidirectional" | "both" => Ok(Self::Bidirectional),
            _ => Err(format!("unknown direction: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalOptions {
    /// Hops from the root (depth 0). `None` explores until the graph is exhausted.
    pub max_depth: Option<usize>,
    /// Edges weaker than this are skipped.
    pub min_strength: f64,
    /// Ceiling on discovered memories, root excluded.
    pub max_nodes: Option<usize>,
    pub compute_confidence: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_strength: 0.0,
            max_nodes: None,
            compute_confidence: false,
        }
    }
}

impl TraversalOptions {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_strength(mut self, strength: f64) -> Self {
        self.min_strength = strength;
        self
    }

    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = Some(nodes);
        self
    }

    pub fn with_confidence(mut self) -> Self {
        self.compute_confidence = true;
        self
    }

    fn admits(&self, edge: &CausalEdge) -> bool {
        edge.strength >= self.min_strength
    }
}

/// A memory reached by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainNode {
    pub memory: Memory,
    /// Hops from the root.
    pub depth: usize,
    /// Product of edge strengths along the path that discovered this node.
    pub path_strength: f64,
    /// Id of the edge that discovered this node.
    pub via_edge: String,
    /// Id of the memory this node was reached from.
    pub via_parent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chain {
    pub root_id: String,
    pub direction: Direction,
    /// Discovered memories in breadth-first order; the root is not included.
    pub nodes: Vec<ChainNode>,
    pub edges: Vec<CausalEdge>,
    /// Distinct memories in the chain, root included. Zero when the root is missing.
    pub total_memories: usize,
    pub max_depth_reached: usize,
    pub chain_confidence: Option<f64>,
    /// Edge endpoints that do not exist in the store. Memories hidden by a
    /// time scope are not listed here.
    pub missing: Vec<String>,
    /// `true` when `max_nodes` stopped the traversal early.
    pub truncated: bool,
}

impl Chain {
    fn empty(root_id: &str, direction: Direction) -> Self {
        Self {
            root_id: root_id.to_string(),
            direction,
            nodes: Vec::new(),
            edges: Vec::new(),
            total_memories: 0,
            max_depth_reached: 0,
            chain_confidence: None,
            missing: Vec::new(),
            truncated: false,
        }
    }

    pub fn contains(&self, memory_id: &str) -> bool {
        self.nodes.iter().any(|n| n.memory.id == memory_id)
    }

    /// Mean path strength over the leaves of the discovery tree. A root with
    /// no discovered nodes is vacuously certain.
    fn leaf_confidence(nodes: &[ChainNode]) -> f64 {
        let parents: HashSet<&str> = nodes.iter().map(|n| n.via_parent.as_str()).collect();
        let leaves: Vec<f64> = nodes
            .iter()
            .filter(|n| !parents.contains(n.memory.id.as_str()))
            .map(|n| n.path_strength)
            .collect();
        if leaves.is_empty() {
            return 1.0;
        }
        let mean = leaves.iter().sum::<f64>() / leaves.len() as f64;
        if mean.is_nan() {
            MIN_CHAIN_CONFIDENCE
        } else {
            mean.clamp(MIN_CHAIN_CONFIDENCE, 1.0)
        }
    }
}

/// Immediate edges of a memory, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Neighbors {
    pub incoming: Vec<CausalEdge>,
    pub outgoing: Vec<CausalEdge>,
}

/// Read-only graph algorithms over the edges held by a [`MemoryReader`].
pub struct CausalTraverser<'a, R: MemoryReader + ?Sized> {
    reader: &'a R,
}

impl<'a, R: MemoryReader + ?Sized> CausalTraverser<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self { reader }
    }

    pub(crate) fn reader(&self) -> &'a R {
        self.reader
    }

    /// Walk incoming edges: what led to `id`.
    pub fn trace_origins(&self, id: &str, options: &TraversalOptions) -> Result<Chain> {
        self.trace(id, Direction::Origins, options)
    }

    /// Walk outgoing edges: what `id` led to.
    pub fn trace_effects(&self, id: &str, options: &TraversalOptions) -> Result<Chain> {
        self.trace(id, Direction::Effects, options)
    }

    /// Union of [`trace_origins`](Self::trace_origins) and
    /// [`trace_effects`](Self::trace_effects). A memory reached both ways keeps
    /// its shallower discovery.
    pub fn trace_bidirectional(&self, id: &str, options: &TraversalOptions) -> Result<Chain> {
        self.trace(id, Direction::Bidirectional, options)
    }

    pub fn trace(&self, id: &str, direction: Direction, options: &TraversalOptions) -> Result<Chain> {
        let Some(root) = self.reader.read(id)? else {
            debug!(memory_id = %id, "trace root not found");
            return Ok(Chain::empty(id, direction));
        };

        let chain = match direction {
            Direction::Origins | Direction::Effects => self.bfs(&root, direction, options)?,
            Direction::Bidirectional => {
                let origins = self.bfs(&root, Direction::Origins, options)?;
                let effects = self.bfs(&root, Direction::Effects, options)?;
                merge(origins, effects, options)
            }
        };

        debug!(
            memory_id = %id,
            direction = %direction,
            nodes = chain.nodes.len(),
            edges = chain.edges.len(),
            depth = chain.max_depth_reached,
            "trace complete"
        );
        Ok(chain)
    }

    fn bfs(&self, root: &Memory, direction: Direction, options: &TraversalOptions) -> Result<Chain> {
        let mut chain = Chain::empty(&root.id, direction);
        let mut visited: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut seen_edges: HashSet<String> = HashSet::new();
        let mut hidden: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize, f64)> = VecDeque::from([(root.id.clone(), 0, 1.0)]);

        while let Some((current, depth, strength)) = queue.pop_front() {
            if options.max_depth.is_some_and(|max| depth >= max) {
                continue;
            }

            let edges = match direction {
                Direction::Origins => self.reader.edges_to(&current)?,
                _ => self.reader.edges_from(&current)?,
            };

            for edge in edges {
                if !options.admits(&edge) {
                    continue;
                }
                let next = match direction {
                    Direction::Origins => edge.source_id.clone(),
                    _ => edge.target_id.clone(),
                };
                if hidden.contains(&next) {
                    continue;
                }
                let is_new = !visited.contains(&next);
                let memory = if is_new {
                    match self.reader.read(&next)? {
                        None if self.reader.is_stored(&next)? => {
                            debug!(memory_id = %next, edge_id = %edge.id, "causal edge leads outside the time scope");
                            hidden.insert(next);
                            continue;
                        }
                        found => found,
                    }
                } else {
                    None
                };
                if is_new && options.max_nodes.is_some_and(|max| chain.nodes.len() >= max) {
                    chain.truncated = true;
                    continue;
                }
                if seen_edges.insert(edge.id.clone()) {
                    chain.edges.push(edge.clone());
                }
                if !is_new {
                    continue;
                }
                visited.insert(next.clone());

                let Some(memory) = memory else {
                    warn!(memory_id = %next, edge_id = %edge.id, "causal edge points at a missing memory");
                    chain.missing.push(next);
                    continue;
                };
                let path_strength = strength * edge.strength;
                chain.max_depth_reached = chain.max_depth_reached.max(depth + 1);
                chain.nodes.push(ChainNode {
                    memory,
                    depth: depth + 1,
                    path_strength,
                    via_edge: edge.id.clone(),
                    via_parent: current.clone(),
                });
                queue.push_back((next, depth + 1, path_strength));
            }
        }

        chain.total_memories = chain.nodes.len() + 1;
        if options.compute_confidence {
            chain.chain_confidence = Some(Chain::leaf_confidence(&chain.nodes));
        }
        Ok(chain)
    }

    /// Depth-1 edges of `id`, unfiltered.
    pub fn get_neighbors(&self, id: &str) -> Result<Neighbors> {
        Ok(Neighbors {
            incoming: self.reader.edges_to(id)?,
            outgoing: self.reader.edges_from(id)?,
        })
    }
}

/// Union two single-direction chains from the same root.
fn merge(origins: Chain, effects: Chain, options: &TraversalOptions) -> Chain {
    let mut merged = Chain::empty(&origins.root_id, Direction::Bidirectional);

    let mut index: HashMap<String, usize> = HashMap::new();
    for node in origins.nodes.into_iter().chain(effects.nodes) {
        match index.get(&node.memory.id) {
            Some(&i) => {
                let kept = &merged.nodes[i];
                if (node.depth, -node.path_strength) < (kept.depth, -kept.path_strength) {
                    merged.nodes[i] = node;
                }
            }
            None => {
                index.insert(node.memory.id.clone(), merged.nodes.len());
                merged.nodes.push(node);
            }
        }
    }
    // Breadth-first across both directions; stable, so origins lead within a depth.
    merged.nodes.sort_by_key(|n| n.depth);

    merged.truncated = origins.truncated || effects.truncated;
    if let Some(max) = options.max_nodes {
        if merged.nodes.len() > max {
            merged.nodes.truncate(max);
            merged.truncated = true;
        }
    }

    let kept: HashSet<&str> = merged.nodes.iter().map(|n| n.memory.id.as_str()).collect();
    let mut missing: Vec<String> = Vec::new();
    for id in origins.missing.into_iter().chain(effects.missing) {
        if !missing.contains(&id) {
            missing.push(id);
        }
    }
    let in_chain = |id: &str| id == merged.root_id || kept.contains(id) || missing.iter().any(|m| m == id);

    let mut seen_edges: HashSet<String> = HashSet::new();
    let mut edges = Vec::new();
    for edge in origins.edges.into_iter().chain(effects.edges) {
        if in_chain(&edge.source_id) && in_chain(&edge.target_id) && seen_edges.insert(edge.id.clone()) {
            edges.push(edge);
        }
    }

    merged.max_depth_reached = merged.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
    merged.total_memories = merged.nodes.len() + 1;
    if options.compute_confidence {
        merged.chain_confidence = Some(Chain::leaf_confidence(&merged.nodes));
    }
    merged.edges = edges;
    merged.missing = missing;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::{MemoryStore, SqliteStore};
    use crate::memory::types::CausalRelation;

    fn store_with(n: usize) -> (SqliteStore, Vec<String>) {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = (0..n)
            .map(|i| store.create(&Memory::semantic(format!("t{i}"), format!("k{i}"))).unwrap())
            .collect();
        (store, ids)
    }

    fn link(store: &SqliteStore, a: &str, b: &str, strength: f64) {
        store.add_relationship(a, b, CausalRelation::Caused, strength, &[]).unwrap();
    }

    #[test]
    fn three_cycle_terminates() {
        let (store, ids) = store_with(3);
        link(&store, &ids[0], &ids[1], 0.9);
        link(&store, &ids[1], &ids[2], 0.9);
        link(&store, &ids[2], &ids[0], 0.9);

        let chain = CausalTraverser::new(&store)
            .trace_effects(&ids[0], &TraversalOptions::default())
            .unwrap();
        assert_eq!(chain.nodes.len(), 2);
        assert_eq!(chain.edges.len(), 3);
        assert_eq!(chain.total_memories, 3);
        assert!(!chain.contains(&ids[0]));
    }

    #[test]
    fn depth_cap_on_long_chain() {
        let (store, ids) = store_with(5);
        for w in ids.windows(2) {
            link(&store, &w[0], &w[1], 0.8);
        }
        let t = CausalTraverser::new(&store);
        let chain = t
            .trace_origins(&ids[4], &TraversalOptions::default().with_max_depth(2))
            .unwrap();
        assert_eq!(chain.max_depth_reached, 2);
        assert!(chain.nodes.iter().all(|n| n.depth <= 2));
        assert_eq!(chain.nodes.len(), 2);

        let full = t.trace_origins(&ids[4], &TraversalOptions::default()).unwrap();
        assert_eq!(full.max_depth_reached, 4);

        let none = t
            .trace_origins(&ids[4], &TraversalOptions::default().with_max_depth(0))
            .unwrap();
        assert!(none.nodes.is_empty());
        assert_eq!(none.total_memories, 1);
    }

    #[test]
    fn min_strength_filters_edges() {
        let (store, ids) = store_with(3);
        link(&store, &ids[0], &ids[1], 0.9);
        link(&store, &ids[1], &ids[2], 0.2);

        let chain = CausalTraverser::new(&store)
            .trace_origins(&ids[2], &TraversalOptions::default().with_min_strength(0.5))
            .unwrap();
        assert!(chain.edges.iter().all(|e| e.strength >= 0.5));
        assert!(chain.nodes.is_empty());
    }

    #[test]
    fn max_nodes_caps_discovery() {
        let (store, ids) = store_with(5);
        for target in &ids[1..] {
            link(&store, &ids[0], target, 0.5);
        }
        let chain = CausalTraverser::new(&store)
            .trace_effects(&ids[0], &TraversalOptions::default().with_max_nodes(2))
            .unwrap();
        assert_eq!(chain.nodes.len(), 2);
        assert_eq!(chain.edges.len(), 2);
        assert!(chain.truncated);
    }

    #[test]
    fn chain_confidence_multiplies_along_paths() {
        let (store, ids) = store_with(4);
        link(&store, &ids[0], &ids[1], 0.5);
        link(&store, &ids[1], &ids[2], 0.5);
        link(&store, &ids[0], &ids[3], 1.0);

        let t = CausalTraverser::new(&store);
        let chain = t
            .trace_effects(&ids[0], &TraversalOptions::default().with_confidence())
            .unwrap();
        // Leaves: ids[2] at 0.25, ids[3] at 1.0.
        let c = chain.chain_confidence.unwrap();
        assert!((c - 0.625).abs() < 1e-9);

        let alone = t
            .trace_origins(&ids[0], &TraversalOptions::default().with_confidence())
            .unwrap();
        assert_eq!(alone.chain_confidence, Some(1.0));

        let unrequested = t.trace_effects(&ids[0], &TraversalOptions::default()).unwrap();
        assert!(unrequested.chain_confidence.is_none());
    }

    #[test]
    fn bidirectional_is_union() {
        let (store, ids) = store_with(5);
        link(&store, &ids[0], &ids[1], 0.9);
        link(&store, &ids[1], &ids[2], 0.9);
        link(&store, &ids[2], &ids[3], 0.9);
        link(&store, &ids[3], &ids[4], 0.9);

        let t = CausalTraverser::new(&store);
        let options = TraversalOptions::default();
        let origins = t.trace_origins(&ids[2], &options).unwrap();
        let effects = t.trace_effects(&ids[2], &options).unwrap();
        let both = t.trace_bidirectional(&ids[2], &options).unwrap();

        let mut expected: Vec<&str> = origins
            .nodes
            .iter()
            .chain(&effects.nodes)
            .map(|n| n.memory.id.as_str())
            .collect();
        expected.sort();
        let mut got: Vec<&str> = both.nodes.iter().map(|n| n.memory.id.as_str()).collect();
        got.sort();
        assert_eq!(got, expected);
        assert_eq!(both.direction, Direction::Bidirectional);
        assert_eq!(both.edges.len(), 4);
        assert_eq!(both.total_memories, 5);
    }

    #[test]
    fn missing_root_is_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let chain = CausalTraverser::new(&store)
            .trace_effects("nope", &TraversalOptions::default().with_confidence())
            .unwrap();
        assert!(chain.nodes.is_empty());
        assert_eq!(chain.total_memories, 0);
        assert!(chain.chain_confidence.is_none());
    }

    #[test]
    fn dangling_endpoint_is_a_dead_end() {
        let (store, ids) = store_with(2);
        link(&store, &ids[0], &ids[1], 0.9);
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO causal_edges (id, source_id, target_id, relation, strength, created_at) \
                     VALUES ('dangling', ?1, 'ghost', 'caused', 0.7, '2026-01-01T00:00:00.000000Z')",
                    [&ids[1]],
                )?;
                Ok(())
            })
            .unwrap();

        let chain = CausalTraverser::new(&store)
            .trace_effects(&ids[0], &TraversalOptions::default())
            .unwrap();
        assert_eq!(chain.nodes.len(), 1);
        assert_eq!(chain.edges.len(), 2);
        assert_eq!(chain.missing, vec!["ghost".to_string()]);
        assert!(!chain.contains("ghost"));
    }

    #[test]
    fn neighbors_split_by_direction() {
        let (store, ids) = store_with(4);
        link(&store, &ids[1], &ids[0], 0.5);
        link(&store, &ids[2], &ids[0], 0.5);
        link(&store, &ids[0], &ids[3], 0.5);

        let n = CausalTraverser::new(&store).get_neighbors(&ids[0]).unwrap();
        assert_eq!(n.incoming.len(), 2);
        assert_eq!(n.outgoing.len(), 1);
        assert_eq!(n.outgoing[0].target_id, ids[3]);
    }
}
