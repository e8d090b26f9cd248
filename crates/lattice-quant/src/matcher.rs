//! Pattern matching against captured graphs.
//!
//! A node can be covered by several table entries: its own single-op
//! pattern and any number of chains ending at its operator. Resolution is
//! deterministic:
//!
//! 1. Chains ending at the node are tried longest first, ties broken by
//!    registration order.
//! 2. A chain `[op_0, .., op_k]` matches when walking back from the node
//!    through the producer of each node's first tensor argument visits nodes
//!    calling `op_k, .., op_0`, and every node before the terminal has the
//!    next chain node as its only consumer. A value that is also a graph
//!    output has an extra consumer.
//! 3. Otherwise the single-op entry for the node's operator, if any.

use crate::Result;
use crate::config::BackendPatternConfig;
use crate::observation::ObservationType;
use crate::pattern::Pattern;
use crate::table::PatternTable;
use lattice_core::{CapturedGraph, NodeId, OpId};
use std::collections::HashMap;

/// A table entry matched at a node.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch<'t> {
    pub pattern: &'t Pattern,
    pub config: &'t BackendPatternConfig,

    /// Registration position of the entry.
    pub position: usize,

    /// Matched nodes in execution order; the last one is the anchor.
    pub nodes: Vec<NodeId>,
}

impl PatternMatch<'_> {
    /// The node the match was anchored on.
    pub fn terminal(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// The node receiving the pattern's external inputs.
    pub fn root(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn is_chain(&self) -> bool {
        self.nodes.len() > 1
    }

    /// Resolve the observation type, using the root node's tensor argument
    /// count for arity-dependent strategies.
    pub fn observation_type(&self, graph: &CapturedGraph) -> Result<Option<ObservationType>> {
        let root = graph.node(self.root())?;
        Ok(self.config.observation.resolve(root.num_tensor_args()))
    }
}

/// Matches nodes of a graph against a [`PatternTable`].
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher<'t> {
    table: &'t PatternTable,
}

impl<'t> PatternMatcher<'t> {
    pub fn new(table: &'t PatternTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'t PatternTable {
        self.table
    }

    /// Best match anchored at `node`, or `None` if nothing applies.
    pub fn match_node(&self, graph: &CapturedGraph, node: NodeId) -> Result<Option<PatternMatch<'t>>> {
        let op = &graph.node(node)?.op;

        for &position in self.table.chains_ending_with(op) {
            let Some(entry) = self.table.entry(position) else {
                continue;
            };
            if let Some(nodes) = walk_chain(graph, node, entry.pattern.ops())? {
                return Ok(Some(PatternMatch {
                    pattern: &entry.pattern,
                    config: &entry.config,
                    position,
                    nodes,
                }));
            }
        }

        self.single_match(graph, node)
    }

    /// Assign each node at most one match.
    ///
    /// Nodes are visited in reverse capture order so that a chain terminal
    /// claims its producers before they are matched on their own.
    #[tracing::instrument(skip_all, fields(table = self.table.name(), nodes = graph.node_count()))]
    pub fn match_graph(&self, graph: &CapturedGraph) -> Result<GraphMatches<'t>> {
        let mut matches: Vec<PatternMatch<'t>> = Vec::new();
        let mut by_node: HashMap<NodeId, usize> = HashMap::new();

        for &id in graph.topological_order().iter().rev() {
            if by_node.contains_key(&id) {
                continue;
            }
            let Some(mut found) = self.match_node(graph, id)? else {
                continue;
            };
            if found.nodes.iter().any(|n| by_node.contains_key(n)) {
                // A chain overlapping an earlier claim falls back to the
                // node's own entry.
                match self.single_match(graph, id)? {
                    Some(single) => found = single,
                    None => continue,
                }
            }

            let index = matches.len();
            for &n in &found.nodes {
                by_node.insert(n, index);
            }
            tracing::trace!(pattern = %found.pattern, anchor = ?id, "matched");
            matches.push(found);
        }

        // Report matches in execution order of their anchors.
        matches.reverse();
        let last = matches.len().saturating_sub(1);
        for index in by_node.values_mut() {
            *index = last - *index;
        }
        Ok(GraphMatches { matches, by_node })
    }

    fn single_match(&self, graph: &CapturedGraph, node: NodeId) -> Result<Option<PatternMatch<'t>>> {
        let op = &graph.node(node)?.op;
        Ok(self.table.single(op).and_then(|position| {
            self.table.entry(position).map(|entry| PatternMatch {
                pattern: &entry.pattern,
                config: &entry.config,
                position,
                nodes: vec![node],
            })
        }))
    }
}

/// Walk back from `terminal` along first tensor arguments. Returns the
/// chain's nodes in execution order if every op and consumer check holds.
fn walk_chain(
    graph: &CapturedGraph,
    terminal: NodeId,
    ops: &[OpId],
) -> Result<Option<Vec<NodeId>>> {
    let Some((last, earlier)) = ops.split_last() else {
        return Ok(None);
    };
    if &graph.node(terminal)?.op != last {
        return Ok(None);
    }

    let mut nodes = vec![terminal];
    let mut current = terminal;
    for expected in earlier.iter().rev() {
        let Some(producer) = graph
            .node(current)?
            .first_value_arg()
            .and_then(|value| value.producer())
        else {
            return Ok(None);
        };

        let node = graph.node(producer)?;
        if &node.op != expected
            || node.num_outputs != 1
            || graph.is_graph_output(producer)
            || graph.users(producer) != [current]
        {
            return Ok(None);
        }
        nodes.push(producer);
        current = producer;
    }

    nodes.reverse();
    Ok(Some(nodes))
}

/// Per-graph match assignment produced by [`PatternMatcher::match_graph`].
#[derive(Debug, Clone)]
pub struct GraphMatches<'t> {
    matches: Vec<PatternMatch<'t>>,
    by_node: HashMap<NodeId, usize>,
}

impl<'t> GraphMatches<'t> {
    /// The match covering `node`, if any.
    pub fn for_node(&self, node: NodeId) -> Option<&PatternMatch<'t>> {
        self.by_node.get(&node).map(|&i| &self.matches[i])
    }

    /// All matches, ordered by the capture position of their anchors.
    pub fn matches(&self) -> &[PatternMatch<'t>] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Chain matches only.
    pub fn chains(&self) -> impl Iterator<Item = &PatternMatch<'t>> {
        self.matches.iter().filter(|m| m.is_chain())
    }
}
