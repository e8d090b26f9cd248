//! Eager execution frontend.
//!
//! Evaluates every call immediately by lowering it as a one-node graph and
//! dispatching on the spot. Eager and extracted execution therefore share
//! kernels and overload selection; only the scheduling differs.

use lattice_core::{
    Arg, Argument, Backend, Call, CapturedGraph, DispatchInput, Error, Frontend, LowerCtx,
    Module, Node, Operand, Result, Returned, Tensor, ValueRef,
};

use crate::backend::RefBackend;

/// Frontend whose values are concrete tensors.
pub struct Eager<'b> {
    backend: &'b RefBackend,
}

impl<'b> Eager<'b> {
    pub fn new(backend: &'b RefBackend) -> Self {
        Self { backend }
    }
}

impl Frontend for Eager<'_> {
    type Value = Tensor;

    fn call(&mut self, call: Call<Tensor>) -> Result<Vec<Tensor>> {
        let symbol = self.backend.kernel_symbol(&call.op).ok_or_else(|| {
            Error::Unsupported(format!(
                "{} has no reference kernel for eager execution",
                call.op
            ))
        })?;

        let num_tensors = call
            .args
            .iter()
            .filter(|arg| matches!(arg, Arg::Tensor(_)))
            .count();
        let mut graph = CapturedGraph::with_inputs(num_tensors);
        let mut args = Vec::with_capacity(call.args.len());
        let mut operands = Vec::with_capacity(call.args.len());
        let mut inputs = Vec::with_capacity(call.args.len());
        let mut slot = 0;
        for arg in call.args {
            match arg {
                Arg::Tensor(tensor) => {
                    args.push(Argument::Value(ValueRef::Input(slot)));
                    operands.push(Operand::Register(slot));
                    inputs.push(DispatchInput::Tensor(tensor));
                    slot += 1;
                }
                Arg::Scalar(scalar) => {
                    args.push(Argument::Scalar(scalar));
                    operands.push(Operand::Scalar(scalar));
                    inputs.push(DispatchInput::Scalar(scalar));
                }
            }
        }

        let mut node = Node::new(call.op)
            .with_name("eager")
            .with_args(args)
            .with_outputs(call.num_outputs);
        for (key, value) in call.attributes {
            node = node.with_attribute(key, value);
        }
        let id = graph.add_node(node)?;

        let ctx = LowerCtx {
            node: graph.node(id)?,
            node_id: id,
            graph: &graph,
            operands: &operands,
            symbol,
        };
        let outputs = self.backend.lower(&ctx)?.dispatch(&inputs)?;
        if outputs.len() != call.num_outputs {
            return Err(Error::Kernel(format!(
                "{symbol} produced {} outputs, {} expected",
                outputs.len(),
                call.num_outputs
            )));
        }
        Ok(outputs)
    }
}

/// Run a module's forward pass eagerly on concrete tensors.
pub fn run_eager<M: Module>(
    module: &M,
    backend: &RefBackend,
    args: &[Tensor],
) -> Result<Returned<Tensor>> {
    if args.len() != module.arity() {
        return Err(Error::Trace(format!(
            "{} takes {} arguments, {} given",
            module.name(),
            module.arity(),
            args.len()
        )));
    }
    let mut eager = Eager::new(backend);
    module.forward(&mut eager, args)
}
