//! Captured dataflow graph.
//!
//! The captured graph is a static-single-assignment program:
//! - **Nodes** (`Node`) call one operator (`OpId`) on ordered arguments
//! - **Arguments** are either values (a graph input or a node output) or
//!   host-side literal scalars that never become tensors
//! - The graph declares an ordered list of outputs; the same value may
//!   appear at several output positions
//!
//! Nodes are kept in capture order, which is always a topological order:
//! a node may only reference graph inputs or nodes captured before it.

use crate::operator::OpId;
use crate::types::{AttributeValue, Scalar};
use crate::{Error, Result};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Type alias for node identifiers (backed by petgraph NodeIndex).
pub type NodeId = NodeIndex;

/// A reference to a value in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueRef {
    /// The i-th positional input of the traced module.
    Input(usize),

    /// The `output`-th result of `node`.
    Node { node: NodeId, output: usize },
}

impl ValueRef {
    /// First output of `node`.
    pub fn node(node: NodeId) -> Self {
        ValueRef::Node { node, output: 0 }
    }

    /// The producing node, if this is not a graph input.
    pub fn producer(&self) -> Option<NodeId> {
        match self {
            ValueRef::Input(_) => None,
            ValueRef::Node { node, .. } => Some(*node),
        }
    }
}

/// A positional argument of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A tensor value flowing from an input or another node.
    Value(ValueRef),

    /// A host-side literal.
    Scalar(Scalar),
}

impl Argument {
    pub fn as_value(&self) -> Option<ValueRef> {
        match self {
            Argument::Value(v) => Some(*v),
            Argument::Scalar(_) => None,
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Argument::Value(_))
    }
}

/// How the traced callable returned its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStructure {
    /// A single value (not wrapped in a tuple).
    Single,

    /// A tuple of the given length.
    Tuple(usize),
}

impl OutputStructure {
    /// Number of output slots this structure describes.
    pub fn len(&self) -> usize {
        match self {
            OutputStructure::Single => 1,
            OutputStructure::Tuple(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ──────────────────────────────── Node ───────────────────────────────────

/// A single operator call.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node name (unique within a traced graph, e.g. `sub_1`).
    pub name: String,

    /// The operator this node calls.
    pub op: OpId,

    /// Ordered positional arguments.
    pub args: Vec<Argument>,

    /// Keyword-style attributes (e.g. `chunks`).
    pub attributes: HashMap<String, AttributeValue>,

    /// Number of values this node produces.
    pub num_outputs: usize,
}

impl Node {
    /// Create a single-output node with no arguments.
    pub fn new(op: OpId) -> Self {
        Self {
            name: String::new(),
            op,
            args: Vec::new(),
            attributes: HashMap::new(),
            num_outputs: 1,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_args(mut self, args: Vec<Argument>) -> Self {
        self.args = args;
        self
    }

    pub fn with_outputs(mut self, num_outputs: usize) -> Self {
        self.num_outputs = num_outputs;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Values this node reads, in argument order.
    pub fn value_args(&self) -> impl Iterator<Item = ValueRef> + '_ {
        self.args.iter().filter_map(Argument::as_value)
    }

    /// Number of tensor (non-scalar) arguments.
    pub fn num_tensor_args(&self) -> usize {
        self.args.iter().filter(|a| a.is_tensor()).count()
    }

    /// The first tensor argument, if any.
    pub fn first_value_arg(&self) -> Option<ValueRef> {
        self.value_args().next()
    }

    pub fn attr_int(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key) {
            Some(AttributeValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

// ─────────────────────────────── CapturedGraph ───────────────────────────

/// A traced computation graph.
#[derive(Debug, Clone)]
pub struct CapturedGraph {
    /// Node storage; petgraph edges (producer → consumer) exist for
    /// user lookups and cycle checks.
    graph: StableGraph<Node, ()>,

    /// Capture order of live nodes.
    order: Vec<NodeId>,

    /// Names of the traced module's positional parameters.
    input_names: Vec<String>,

    /// Declared graph outputs (may repeat).
    outputs: Vec<ValueRef>,

    /// Original return shape of the traced callable.
    structure: OutputStructure,
}

impl CapturedGraph {
    /// Create an empty graph with the given positional inputs.
    pub fn new(input_names: Vec<String>) -> Self {
        Self {
            graph: StableGraph::new(),
            order: Vec::new(),
            input_names,
            outputs: Vec::new(),
            structure: OutputStructure::Tuple(0),
        }
    }

    /// Create an empty graph with `n` inputs named `arg0..argN`.
    pub fn with_inputs(n: usize) -> Self {
        Self::new((0..n).map(|i| format!("arg{i}")).collect())
    }

    pub fn num_inputs(&self) -> usize {
        self.input_names.len()
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    // ── Node access ──

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.graph
            .node_weight(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {id:?} not found")))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.graph
            .node_weight_mut(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {id:?} not found")))
    }

    /// Node ids in capture (topological) order.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Iterate over nodes in capture order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.order
            .iter()
            .filter_map(|&id| self.graph.node_weight(id).map(|node| (id, node)))
    }

    /// Distinct nodes reading any output of `id`, in capture order.
    pub fn users(&self, id: NodeId) -> Vec<NodeId> {
        let users: HashSet<NodeId> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        self.order
            .iter()
            .copied()
            .filter(|n| users.contains(n))
            .collect()
    }

    /// Whether any declared graph output refers to a result of `id`.
    pub fn is_graph_output(&self, id: NodeId) -> bool {
        self.outputs.iter().any(|v| v.producer() == Some(id))
    }

    // ── Mutation ──

    /// Append a node. Its arguments must reference graph inputs or
    /// already-captured nodes.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        for arg in node.value_args() {
            self.check_value(arg)?;
        }
        if node.num_outputs == 0 {
            return Err(Error::InvalidGraph(format!(
                "Node '{}' ({}) must produce at least one output",
                node.name, node.op
            )));
        }

        let id = self.graph.add_node(node);
        self.order.push(id);
        self.sync_edges(id)?;
        Ok(id)
    }

    /// Replace a node's arguments, keeping its id and capture position.
    pub fn set_args(&mut self, id: NodeId, args: Vec<Argument>) -> Result<()> {
        let position = self.position(id)?;
        for arg in args.iter().filter_map(Argument::as_value) {
            self.check_value(arg)?;
            if let Some(producer) = arg.producer()
                && self.position(producer)? >= position
            {
                return Err(Error::InvalidGraph(format!(
                    "Node {id:?} cannot read a value produced at or after itself"
                )));
            }
        }
        self.node_mut(id)?.args = args;
        self.sync_edges(id)
    }

    /// Remove a node. Fails if anything still reads its outputs.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        if !self.users(id).is_empty() || self.is_graph_output(id) {
            return Err(Error::InvalidGraph(format!(
                "Cannot remove node {id:?}: its outputs are still in use"
            )));
        }
        self.graph.remove_node(id);
        self.order.retain(|&n| n != id);
        Ok(())
    }

    /// Point every use of `from` (node arguments and graph outputs) at `to`.
    pub fn replace_all_uses(&mut self, from: ValueRef, to: ValueRef) -> Result<()> {
        self.check_value(to)?;
        let affected: Vec<NodeId> = self
            .nodes()
            .filter(|(_, node)| node.value_args().any(|v| v == from))
            .map(|(id, _)| id)
            .collect();

        for id in affected {
            let args = self
                .node(id)?
                .args
                .iter()
                .map(|arg| match arg {
                    Argument::Value(v) if *v == from => Argument::Value(to),
                    other => other.clone(),
                })
                .collect();
            self.set_args(id, args)?;
        }

        for output in &mut self.outputs {
            if *output == from {
                *output = to;
            }
        }
        Ok(())
    }

    /// Declare the graph outputs and the callable's return structure.
    pub fn set_outputs(&mut self, outputs: Vec<ValueRef>, structure: OutputStructure) -> Result<()> {
        if outputs.len() != structure.len() {
            return Err(Error::InvalidGraph(format!(
                "Output structure {structure:?} does not match {} outputs",
                outputs.len()
            )));
        }
        for &value in &outputs {
            self.check_value(value)?;
        }
        self.outputs = outputs;
        self.structure = structure;
        Ok(())
    }

    pub fn outputs(&self) -> &[ValueRef] {
        &self.outputs
    }

    pub fn output_structure(&self) -> OutputStructure {
        self.structure
    }

    // ── Validation ──

    /// Check the single-assignment invariants.
    ///
    /// Every argument must reference a graph input or an output of a node
    /// captured earlier, and the dataflow must be acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (id, node) in self.nodes() {
            for value in node.value_args() {
                self.check_value(value)?;
                if let Some(producer) = value.producer()
                    && !seen.contains(&producer)
                {
                    return Err(Error::InvalidGraph(format!(
                        "Node '{}' reads {value:?} before it is produced",
                        node.name
                    )));
                }
            }
            seen.insert(id);
        }

        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(Error::InvalidGraph("Graph contains a cycle".to_string()));
        }

        if self.outputs.len() != self.structure.len() {
            return Err(Error::InvalidGraph(format!(
                "Output structure {:?} does not match {} outputs",
                self.structure,
                self.outputs.len()
            )));
        }
        for &value in &self.outputs {
            self.check_value(value)?;
        }
        Ok(())
    }

    fn check_value(&self, value: ValueRef) -> Result<()> {
        match value {
            ValueRef::Input(i) if i < self.num_inputs() => Ok(()),
            ValueRef::Input(i) => Err(Error::InvalidGraph(format!(
                "Input {i} out of range (graph has {} inputs)",
                self.num_inputs()
            ))),
            ValueRef::Node { node, output } => {
                let producer = self.node(node)?;
                if output < producer.num_outputs {
                    Ok(())
                } else {
                    Err(Error::InvalidGraph(format!(
                        "Node '{}' has {} outputs, output {output} requested",
                        producer.name, producer.num_outputs
                    )))
                }
            }
        }
    }

    fn position(&self, id: NodeId) -> Result<usize> {
        self.order
            .iter()
            .position(|&n| n == id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {id:?} not found")))
    }

    /// Rebuild the incoming petgraph edges of `id` from its arguments.
    fn sync_edges(&mut self, id: NodeId) -> Result<()> {
        let incoming: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        for edge in incoming {
            self.graph.remove_edge(edge);
        }

        let producers: Vec<NodeId> = self.node(id)?.value_args().filter_map(|v| v.producer()).collect();
        for producer in producers {
            self.graph.update_edge(producer, id, ());
        }
        Ok(())
    }
}

impl fmt::Display for CapturedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |value: &ValueRef| match value {
            ValueRef::Input(i) => format!("%{}", self.input_names[*i]),
            ValueRef::Node { node, output } => {
                let name = self
                    .graph
                    .node_weight(*node)
                    .map(|n| n.name.as_str())
                    .unwrap_or("?");
                if *output == 0 {
                    format!("%{name}")
                } else {
                    format!("%{name}.{output}")
                }
            }
        };

        writeln!(f, "graph({}):", self.input_names.join(", "))?;
        for (_, node) in self.nodes() {
            let args: Vec<String> = node
                .args
                .iter()
                .map(|arg| match arg {
                    Argument::Value(v) => render(v),
                    Argument::Scalar(s) => s.to_string(),
                })
                .collect();
            writeln!(f, "  %{} = {}({})", node.name, node.op, args.join(", "))?;
        }
        let outputs: Vec<String> = self.outputs.iter().map(render).collect();
        match self.structure {
            OutputStructure::Single => writeln!(f, "  return {}", outputs.join(", ")),
            OutputStructure::Tuple(_) => writeln!(f, "  return ({})", outputs.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_node(a: ValueRef, b: ValueRef) -> Node {
        Node::new(OpId::function("operator.sub"))
            .with_name("sub")
            .with_args(vec![Argument::Value(a), Argument::Value(b)])
    }

    #[test]
    fn test_create_empty_graph() {
        let graph = CapturedGraph::with_inputs(2);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.num_inputs(), 2);
        assert_eq!(graph.input_names(), &["arg0", "arg1"]);
    }

    #[test]
    fn test_add_node_and_users() {
        let mut graph = CapturedGraph::with_inputs(2);
        let sub = graph
            .add_node(sub_node(ValueRef::Input(0), ValueRef::Input(1)))
            .unwrap();
        let relu = graph
            .add_node(
                Node::new(OpId::method("relu"))
                    .with_name("relu")
                    .with_args(vec![Argument::Value(ValueRef::node(sub))]),
            )
            .unwrap();

        assert_eq!(graph.users(sub), vec![relu]);
        assert!(graph.users(relu).is_empty());
        assert_eq!(graph.topological_order(), &[sub, relu]);
    }

    #[test]
    fn test_add_node_rejects_out_of_range_input() {
        let mut graph = CapturedGraph::with_inputs(1);
        let result = graph.add_node(sub_node(ValueRef::Input(0), ValueRef::Input(3)));
        assert!(result.is_err());
    }

    #[test]
    fn test_add_node_rejects_missing_output_index() {
        let mut graph = CapturedGraph::with_inputs(2);
        let sub = graph
            .add_node(sub_node(ValueRef::Input(0), ValueRef::Input(1)))
            .unwrap();
        let bad = ValueRef::Node {
            node: sub,
            output: 1,
        };
        assert!(graph.add_node(sub_node(bad, ValueRef::Input(0))).is_err());
    }

    #[test]
    fn test_set_outputs_checks_structure() {
        let mut graph = CapturedGraph::with_inputs(2);
        let sub = graph
            .add_node(sub_node(ValueRef::Input(0), ValueRef::Input(1)))
            .unwrap();
        let out = ValueRef::node(sub);

        assert!(
            graph
                .set_outputs(vec![out, out], OutputStructure::Single)
                .is_err()
        );
        graph
            .set_outputs(vec![out, out], OutputStructure::Tuple(2))
            .unwrap();
        assert_eq!(graph.outputs(), &[out, out]);
        assert!(graph.is_graph_output(sub));
        graph.validate().unwrap();
    }

    #[test]
    fn test_remove_node_in_use_fails() {
        let mut graph = CapturedGraph::with_inputs(2);
        let sub = graph
            .add_node(sub_node(ValueRef::Input(0), ValueRef::Input(1)))
            .unwrap();
        graph
            .set_outputs(vec![ValueRef::node(sub)], OutputStructure::Single)
            .unwrap();
        assert!(graph.remove_node(sub).is_err());
    }

    #[test]
    fn test_replace_all_uses() {
        let mut graph = CapturedGraph::with_inputs(2);
        let a = graph
            .add_node(sub_node(ValueRef::Input(0), ValueRef::Input(1)))
            .unwrap();
        let b = graph
            .add_node(sub_node(ValueRef::Input(1), ValueRef::Input(0)))
            .unwrap();
        let c = graph
            .add_node(sub_node(ValueRef::node(a), ValueRef::Input(0)))
            .unwrap();
        graph
            .set_outputs(
                vec![ValueRef::node(c), ValueRef::node(a)],
                OutputStructure::Tuple(2),
            )
            .unwrap();

        graph
            .replace_all_uses(ValueRef::node(a), ValueRef::node(b))
            .unwrap();

        assert_eq!(graph.users(a), Vec::<NodeId>::new());
        assert_eq!(graph.users(b), vec![c]);
        assert_eq!(graph.outputs()[1], ValueRef::node(b));
        graph.remove_node(a).unwrap();
        graph.validate().unwrap();
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_set_args_rejects_forward_reference() {
        let mut graph = CapturedGraph::with_inputs(2);
        let a = graph
            .add_node(sub_node(ValueRef::Input(0), ValueRef::Input(1)))
            .unwrap();
        let b = graph
            .add_node(sub_node(ValueRef::node(a), ValueRef::Input(1)))
            .unwrap();
        let result = graph.set_args(
            a,
            vec![Argument::Value(ValueRef::node(b)), Argument::Value(ValueRef::Input(0))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        let mut graph = CapturedGraph::new(vec!["a".to_string(), "b".to_string()]);
        let sub = graph
            .add_node(sub_node(ValueRef::Input(0), ValueRef::Input(1)))
            .unwrap();
        graph
            .set_outputs(vec![ValueRef::node(sub)], OutputStructure::Single)
            .unwrap();

        let text = graph.to_string();
        assert!(text.contains("%sub = operator.sub(%a, %b)"));
        assert!(text.contains("return %sub"));
    }
}
