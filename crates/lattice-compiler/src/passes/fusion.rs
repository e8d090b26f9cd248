//! Pattern fusion pass.
//!
//! Collapses every matched chain whose table entry carries a fuser method
//! into a single node. The terminal node is rewritten in place, so every
//! reader of the chain's result keeps pointing at the same value, and the
//! now-unread earlier chain nodes are removed.

use lattice_core::{CapturedGraph, Error, Node, NodeId, Pass, Result, Stage};
use lattice_quant::{PatternMatcher, PatternTable, QuantError};
use std::sync::Arc;

/// Pass that fuses chains such as `nn.Linear -> nn.ReLU` into
/// `nn.intrinsic.LinearReLU`.
pub struct FusionPass {
    table: Arc<PatternTable>,
}

impl FusionPass {
    pub fn new(table: impl Into<Arc<PatternTable>>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }
}

impl Pass for FusionPass {
    fn name(&self) -> &str {
        "fusion"
    }

    fn stage(&self) -> Stage {
        Stage::Optimization
    }

    fn run(&self, graph: &mut CapturedGraph) -> Result<bool> {
        let plans = {
            let matches = PatternMatcher::new(&self.table)
                .match_graph(graph)
                .map_err(into_core)?;

            let mut plans: Vec<(Vec<NodeId>, Node)> = Vec::new();
            for found in matches.chains() {
                let Some(fuser) = &found.config.fuser_method else {
                    continue;
                };
                let fused = fuser.fuse(graph, &found.nodes).map_err(into_core)?;
                plans.push((found.nodes.clone(), fused));
            }
            plans
        };

        let fused_count = plans.len();
        for (chain, fused) in plans {
            apply(graph, &chain, fused)?;
        }
        if fused_count > 0 {
            tracing::debug!(fused = fused_count, "chains fused");
        }
        Ok(fused_count > 0)
    }
}

/// Rewrite the chain's terminal into `fused` and drop the rest of the chain.
fn apply(graph: &mut CapturedGraph, chain: &[NodeId], fused: Node) -> Result<()> {
    let Some((&terminal, earlier)) = chain.split_last() else {
        return Ok(());
    };
    tracing::trace!(node = %fused.name, op = %fused.op, "fusing chain");

    let Node {
        name,
        op,
        args,
        attributes,
        num_outputs,
    } = fused;
    graph.set_args(terminal, args)?;
    let node = graph.node_mut(terminal)?;
    node.name = name;
    node.op = op;
    node.attributes = attributes;
    node.num_outputs = num_outputs;

    for &id in earlier.iter().rev() {
        graph.remove_node(id)?;
    }
    Ok(())
}

fn into_core(error: QuantError) -> Error {
    match error {
        QuantError::Core(e) => e,
        other => Error::InvalidGraph(format!("Fusion failed: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::{Argument, OpId, OutputStructure, ValueRef};

    fn linear_relu_graph(relu: OpId) -> (CapturedGraph, NodeId) {
        let mut graph = CapturedGraph::with_inputs(1);
        let linear = graph
            .add_node(
                Node::new(OpId::module("nn.Linear"))
                    .with_name("linear")
                    .with_args(vec![Argument::Value(ValueRef::Input(0))]),
            )
            .unwrap();
        let relu = graph
            .add_node(
                Node::new(relu)
                    .with_name("relu")
                    .with_args(vec![Argument::Value(ValueRef::node(linear))]),
            )
            .unwrap();
        let neg = graph
            .add_node(
                Node::new(OpId::function("torch.neg"))
                    .with_name("neg")
                    .with_args(vec![Argument::Value(ValueRef::node(relu))]),
            )
            .unwrap();
        graph
            .set_outputs(
                vec![ValueRef::node(relu), ValueRef::node(neg)],
                OutputStructure::Tuple(2),
            )
            .unwrap();
        (graph, relu)
    }

    #[test]
    fn test_fuses_linear_relu() {
        let table = lattice_quant::native_backend_config().unwrap();
        let (mut graph, relu) = linear_relu_graph(OpId::module("nn.ReLU"));

        let changed = FusionPass::new(table).run(&mut graph).unwrap();
        assert!(changed);
        assert_eq!(graph.node_count(), 2);

        let fused = graph.node(relu).unwrap();
        assert_eq!(fused.op, OpId::module("nn.intrinsic.LinearReLU"));
        assert_eq!(fused.name, "linear_relu");
        assert_eq!(fused.args, vec![Argument::Value(ValueRef::Input(0))]);
        assert_eq!(graph.outputs()[0], ValueRef::node(relu));
        graph.validate().unwrap();
    }

    #[test]
    fn test_chain_without_fuser_is_left_alone() {
        let table = lattice_quant::native_backend_config().unwrap();
        let mut graph = CapturedGraph::with_inputs(1);
        let linear = graph
            .add_node(
                Node::new(OpId::function("nn.functional.linear"))
                    .with_args(vec![Argument::Value(ValueRef::Input(0))]),
            )
            .unwrap();
        let relu = graph
            .add_node(
                Node::new(OpId::function("nn.functional.relu"))
                    .with_args(vec![Argument::Value(ValueRef::node(linear))]),
            )
            .unwrap();
        graph
            .set_outputs(vec![ValueRef::node(relu)], OutputStructure::Single)
            .unwrap();

        assert!(!FusionPass::new(table).run(&mut graph).unwrap());
        assert_eq!(graph.node_count(), 2);
    }
}
