//! Dead code elimination pass.

use lattice_core::{CapturedGraph, Pass, Result, Stage};

/// Removes nodes whose results are neither read nor returned.
///
/// Walks the graph in reverse capture order so a node becomes removable in
/// the same sweep once its last reader is gone.
pub struct DeadCodeEliminationPass;

impl DeadCodeEliminationPass {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for DeadCodeEliminationPass {
    fn name(&self) -> &str {
        "dead_code_elimination"
    }

    fn stage(&self) -> Stage {
        Stage::Cleanup
    }

    fn run(&self, graph: &mut CapturedGraph) -> Result<bool> {
        let order: Vec<_> = graph.topological_order().iter().rev().copied().collect();
        let mut removed = 0usize;
        for id in order {
            if graph.users(id).is_empty() && !graph.is_graph_output(id) {
                tracing::trace!(node = %graph.node(id)?.name, "removing dead node");
                graph.remove_node(id)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "dead code eliminated");
        }
        Ok(removed > 0)
    }
}
