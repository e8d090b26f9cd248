//! Symbolic tracing of modules into captured graphs.
//!
//! A [`Module`] writes its forward computation once against the
//! [`Frontend`] trait. Running it with a [`Tracer`] records a
//! [`CapturedGraph`]; running it with an eager frontend computes tensors
//! directly. Both see exactly the same sequence of operator calls, which is
//! what makes eager/lowered comparisons meaningful.

use crate::ir::{Argument, CapturedGraph, Node, OutputStructure, ValueRef};
use crate::operator::OpId;
use crate::types::{AttributeValue, Scalar};
use crate::{Error, Result};
use std::collections::HashMap;

/// A positional argument passed to a frontend call.
#[derive(Debug, Clone)]
pub enum Arg<V> {
    Tensor(V),
    Scalar(Scalar),
}

/// One operator invocation as seen by a frontend.
#[derive(Debug, Clone)]
pub struct Call<V> {
    pub op: OpId,
    pub args: Vec<Arg<V>>,
    pub attributes: Vec<(String, AttributeValue)>,
    pub num_outputs: usize,
}

impl<V> Call<V> {
    pub fn new(op: OpId) -> Self {
        Self {
            op,
            args: Vec::new(),
            attributes: Vec::new(),
            num_outputs: 1,
        }
    }

    pub fn tensor(mut self, value: V) -> Self {
        self.args.push(Arg::Tensor(value));
        self
    }

    pub fn scalar(mut self, value: impl Into<Scalar>) -> Self {
        self.args.push(Arg::Scalar(value.into()));
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.push((key.into(), value));
        self
    }

    pub fn outputs(mut self, num_outputs: usize) -> Self {
        self.num_outputs = num_outputs;
        self
    }
}

/// The execution surface a module's forward pass is written against.
pub trait Frontend {
    /// Handle for a tensor value in this frontend.
    type Value: Clone;

    /// Invoke an operator, returning exactly `call.num_outputs` values.
    fn call(&mut self, call: Call<Self::Value>) -> Result<Vec<Self::Value>>;
}

/// Convenience constructors for the operators used by traced modules.
///
/// The identifiers mirror how a Python-level trace would record these
/// calls: infix arithmetic goes through `operator.*`, library calls
/// through `torch.*`.
pub trait FrontendExt: Frontend {
    fn call_one(&mut self, call: Call<Self::Value>) -> Result<Self::Value> {
        let op = call.op.clone();
        self.call(call)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Trace(format!("{op} produced no outputs")))
    }

    fn binary(&mut self, op: &str, a: &Self::Value, b: &Self::Value) -> Result<Self::Value> {
        self.call_one(Call::new(OpId::function(op)).tensor(a.clone()).tensor(b.clone()))
    }

    fn binary_scalar(
        &mut self,
        op: &str,
        a: &Self::Value,
        b: impl Into<Scalar>,
    ) -> Result<Self::Value> {
        self.call_one(Call::new(OpId::function(op)).tensor(a.clone()).scalar(b))
    }

    fn add(&mut self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value> {
        self.binary("operator.add", a, b)
    }

    fn sub(&mut self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value> {
        self.binary("operator.sub", a, b)
    }

    fn mul(&mut self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value> {
        self.binary("operator.mul", a, b)
    }

    fn div(&mut self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value> {
        self.binary("operator.truediv", a, b)
    }

    fn add_scalar(&mut self, a: &Self::Value, b: impl Into<Scalar>) -> Result<Self::Value> {
        self.binary_scalar("operator.add", a, b)
    }

    fn sub_scalar(&mut self, a: &Self::Value, b: impl Into<Scalar>) -> Result<Self::Value> {
        self.binary_scalar("operator.sub", a, b)
    }

    fn mul_scalar(&mut self, a: &Self::Value, b: impl Into<Scalar>) -> Result<Self::Value> {
        self.binary_scalar("operator.mul", a, b)
    }

    fn neg(&mut self, a: &Self::Value) -> Result<Self::Value> {
        self.call_one(Call::new(OpId::function("operator.neg")).tensor(a.clone()))
    }

    fn relu(&mut self, a: &Self::Value) -> Result<Self::Value> {
        self.call_one(Call::new(OpId::function("torch.relu")).tensor(a.clone()))
    }

    fn sigmoid(&mut self, a: &Self::Value) -> Result<Self::Value> {
        self.call_one(Call::new(OpId::function("torch.sigmoid")).tensor(a.clone()))
    }

    fn tanh(&mut self, a: &Self::Value) -> Result<Self::Value> {
        self.call_one(Call::new(OpId::function("torch.tanh")).tensor(a.clone()))
    }

    /// `a + value * b * c`, with `value` kept as a host scalar.
    fn addcmul(
        &mut self,
        a: &Self::Value,
        b: &Self::Value,
        c: &Self::Value,
        value: impl Into<Scalar>,
    ) -> Result<Self::Value> {
        self.call_one(
            Call::new(OpId::function("torch.addcmul"))
                .tensor(a.clone())
                .tensor(b.clone())
                .tensor(c.clone())
                .scalar(value),
        )
    }

    /// Split along dimension 0 into exactly `chunks` values.
    fn chunk(&mut self, a: &Self::Value, chunks: usize) -> Result<Vec<Self::Value>> {
        self.call(
            Call::new(OpId::function("torch.chunk"))
                .tensor(a.clone())
                .attr("chunks", AttributeValue::Int(chunks as i64))
                .outputs(chunks),
        )
    }

    /// Call a tensor method such as `x.relu()`.
    fn call_method(&mut self, name: &str, args: &[Self::Value]) -> Result<Self::Value> {
        let call = args
            .iter()
            .cloned()
            .fold(Call::new(OpId::method(name)), Call::tensor);
        self.call_one(call)
    }

    /// Call a leaf module such as `nn.ReLU`.
    fn call_module(&mut self, name: &str, args: &[Self::Value]) -> Result<Self::Value> {
        let call = args
            .iter()
            .cloned()
            .fold(Call::new(OpId::module(name)), Call::tensor);
        self.call_one(call)
    }
}

impl<F: Frontend + ?Sized> FrontendExt for F {}

/// What a forward pass returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned<V> {
    Single(V),
    Tuple(Vec<V>),
}

impl<V> Returned<V> {
    pub fn structure(&self) -> OutputStructure {
        match self {
            Returned::Single(_) => OutputStructure::Single,
            Returned::Tuple(values) => OutputStructure::Tuple(values.len()),
        }
    }

    pub fn into_values(self) -> Vec<V> {
        match self {
            Returned::Single(v) => vec![v],
            Returned::Tuple(values) => values,
        }
    }
}

/// A traceable computation.
pub trait Module {
    /// Module name, used in logs.
    fn name(&self) -> &str;

    /// Number of positional tensor parameters of `forward`.
    fn arity(&self) -> usize;

    /// Parameter names, in positional order.
    fn input_names(&self) -> Vec<String> {
        (0..self.arity()).map(|i| format!("arg{i}")).collect()
    }

    /// The forward computation. `args` has exactly `arity()` values.
    fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>>;
}

/// Frontend that records every call as a graph node.
pub struct Tracer {
    graph: CapturedGraph,
    name_counts: HashMap<String, usize>,
}

impl Tracer {
    pub fn new(input_names: Vec<String>) -> Self {
        Self {
            graph: CapturedGraph::new(input_names),
            name_counts: HashMap::new(),
        }
    }

    /// Values standing for the graph inputs.
    pub fn inputs(&self) -> Vec<ValueRef> {
        (0..self.graph.num_inputs()).map(ValueRef::Input).collect()
    }

    /// Finish tracing with the given return value.
    pub fn finish(mut self, returned: Returned<ValueRef>) -> Result<CapturedGraph> {
        let structure = returned.structure();
        self.graph.set_outputs(returned.into_values(), structure)?;
        self.graph.validate()?;
        Ok(self.graph)
    }

    fn next_name(&mut self, op: &OpId) -> String {
        let base = op
            .name()
            .rsplit('.')
            .next()
            .unwrap_or(op.name())
            .trim_end_matches('_')
            .to_lowercase();
        let count = self.name_counts.entry(base.clone()).or_insert(0);
        let name = if *count == 0 {
            base
        } else {
            format!("{base}_{count}")
        };
        *count += 1;
        name
    }
}

impl Frontend for Tracer {
    type Value = ValueRef;

    fn call(&mut self, call: Call<ValueRef>) -> Result<Vec<ValueRef>> {
        let name = self.next_name(&call.op);
        let args = call
            .args
            .into_iter()
            .map(|arg| match arg {
                Arg::Tensor(v) => Argument::Value(v),
                Arg::Scalar(s) => Argument::Scalar(s),
            })
            .collect();

        let mut node = Node::new(call.op)
            .with_name(name)
            .with_args(args)
            .with_outputs(call.num_outputs);
        for (key, value) in call.attributes {
            node = node.with_attribute(key, value);
        }

        let id = self.graph.add_node(node)?;
        Ok((0..call.num_outputs)
            .map(|output| ValueRef::Node { node: id, output })
            .collect())
    }
}

/// Trace a module into a captured graph.
#[tracing::instrument(skip_all, fields(module = module.name()))]
pub fn trace<M: Module>(module: &M) -> Result<CapturedGraph> {
    let mut tracer = Tracer::new(module.input_names());
    let inputs = tracer.inputs();
    let returned = module.forward(&mut tracer, &inputs)?;
    let graph = tracer.finish(returned)?;
    tracing::debug!(num_nodes = graph.node_count(), "traced module");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReturnDup;

    impl Module for ReturnDup {
        fn name(&self) -> &str {
            "ReturnDup"
        }

        fn arity(&self) -> usize {
            2
        }

        fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>> {
            let c = f.add(&args[0], &args[1])?;
            let d = f.sub(&args[0], &args[1])?;
            let e = f.add_scalar(&args[0], 1i64)?;
            Ok(Returned::Tuple(vec![d, c.clone(), e, c]))
        }
    }

    #[test]
    fn test_trace_records_nodes_in_order() {
        let graph = trace(&ReturnDup).unwrap();
        let names: Vec<_> = graph.nodes().map(|(_, n)| n.name.clone()).collect();
        assert_eq!(names, vec!["add", "sub", "add_1"]);
        assert_eq!(graph.output_structure(), OutputStructure::Tuple(4));
    }

    #[test]
    fn test_trace_preserves_duplicate_outputs() {
        let graph = trace(&ReturnDup).unwrap();
        let outputs = graph.outputs();
        assert_eq!(outputs[1], outputs[3]);
        assert_ne!(outputs[0], outputs[2]);
    }

    #[test]
    fn test_trace_keeps_scalars_as_literals() {
        let graph = trace(&ReturnDup).unwrap();
        let (_, add_1) = graph.nodes().nth(2).unwrap();
        assert_eq!(add_1.num_tensor_args(), 1);
        assert_eq!(add_1.args[1], Argument::Scalar(Scalar::Int(1)));
    }

    #[test]
    fn test_chunk_has_multiple_outputs() {
        let mut tracer = Tracer::new(vec!["x".to_string()]);
        let inputs = tracer.inputs();
        let pieces = tracer.chunk(&inputs[0], 2).unwrap();
        assert_eq!(pieces.len(), 2);

        let graph = tracer.finish(Returned::Tuple(pieces)).unwrap();
        let (_, node) = graph.nodes().next().unwrap();
        assert_eq!(node.num_outputs, 2);
        assert_eq!(node.attr_int("chunks"), Some(2));
    }
}
