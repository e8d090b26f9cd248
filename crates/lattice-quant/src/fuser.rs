//! Fusion of matched chains.

use crate::{QuantError, Result};
use lattice_core::{Argument, CapturedGraph, Node, NodeId, OpId};
use serde::Serialize;

/// How a matched chain is collapsed into a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FuserMethod {
    /// Replace the chain with one call to the fused module, e.g.
    /// `nn.Linear -> nn.ReLU` becomes `nn.intrinsic.LinearReLU`.
    Sequential { fused: OpId },
}

impl FuserMethod {
    pub fn sequential(fused: OpId) -> Self {
        FuserMethod::Sequential { fused }
    }

    pub fn fused_op(&self) -> &OpId {
        match self {
            FuserMethod::Sequential { fused } => fused,
        }
    }

    /// Build the node replacing `chain` (node ids in execution order).
    ///
    /// The fused node takes the head's arguments followed by the arguments
    /// of later chain nodes that do not come from the chain itself.
    /// Attributes are merged with later nodes taking precedence, and the
    /// output count is the terminal's.
    pub fn fuse(&self, graph: &CapturedGraph, chain: &[NodeId]) -> Result<Node> {
        let (&head, rest) = chain
            .split_first()
            .ok_or_else(|| QuantError::Fusion("cannot fuse an empty chain".to_string()))?;
        if rest.is_empty() {
            return Err(QuantError::Fusion(format!(
                "chain starting at {head:?} has a single node"
            )));
        }

        let head_node = graph.node(head)?;
        let mut args = head_node.args.clone();
        let mut attributes = head_node.attributes.clone();
        let mut names = vec![head_node.name.clone()];
        let mut previous = head;
        let mut num_outputs = head_node.num_outputs;

        for &id in rest {
            let node = graph.node(id)?;
            let side_args = node.args.iter().filter(|arg| match arg {
                Argument::Value(v) => v.producer() != Some(previous),
                Argument::Scalar(_) => true,
            });
            args.extend(side_args.cloned());
            attributes.extend(node.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
            names.push(node.name.clone());
            num_outputs = node.num_outputs;
            previous = id;
        }

        let mut fused = Node::new(self.fused_op().clone())
            .with_name(names.join("_"))
            .with_args(args)
            .with_outputs(num_outputs);
        fused.attributes = attributes;
        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::{Scalar, ValueRef};

    #[test]
    fn test_fuse_linear_relu() {
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
                Node::new(OpId::module("nn.ReLU"))
                    .with_name("relu")
                    .with_args(vec![Argument::Value(ValueRef::node(linear))]),
            )
            .unwrap();

        let fuser = FuserMethod::sequential(OpId::module("nn.intrinsic.LinearReLU"));
        let fused = fuser.fuse(&graph, &[linear, relu]).unwrap();
        assert_eq!(fused.op, OpId::module("nn.intrinsic.LinearReLU"));
        assert_eq!(fused.name, "linear_relu");
        assert_eq!(fused.args, vec![Argument::Value(ValueRef::Input(0))]);
    }

    #[test]
    fn test_fuse_keeps_side_arguments() {
        let mut graph = CapturedGraph::with_inputs(2);
        let add = graph
            .add_node(
                Node::new(OpId::function("operator.add"))
                    .with_name("add")
                    .with_args(vec![
                        Argument::Value(ValueRef::Input(0)),
                        Argument::Value(ValueRef::Input(1)),
                    ]),
            )
            .unwrap();
        let scale = graph
            .add_node(
                Node::new(OpId::function("operator.mul"))
                    .with_name("mul")
                    .with_args(vec![
                        Argument::Value(ValueRef::node(add)),
                        Argument::Scalar(Scalar::Float(0.5)),
                    ]),
            )
            .unwrap();

        let fuser = FuserMethod::sequential(OpId::function("fused.add_mul"));
        let fused = fuser.fuse(&graph, &[add, scale]).unwrap();
        assert_eq!(fused.args.len(), 3);
        assert_eq!(fused.args[2], Argument::Scalar(Scalar::Float(0.5)));
    }

    #[test]
    fn test_fuse_rejects_single_node() {
        let mut graph = CapturedGraph::with_inputs(1);
        let id = graph
            .add_node(
                Node::new(OpId::module("nn.ReLU")).with_args(vec![Argument::Value(ValueRef::Input(0))]),
            )
            .unwrap();
        let fuser = FuserMethod::sequential(OpId::module("nn.ReLU"));
        assert!(fuser.fuse(&graph, &[id]).is_err());
        assert!(fuser.fuse(&graph, &[]).is_err());
    }
}
