//! Register-based runner for lowered graphs.
//!
//! Executes a [`LoweredGraph`] by dispatching its entries in order through
//! a register file of tensor slots. The register file is allocated per
//! call, so a runner is never mutated by execution.

use crate::error::{Result, RuntimeError};
use lattice_compiler::{CompilerPipeline, LazyConfig};
use lattice_core::{
    Backend, DispatchInput, LoweredGraph, Module, Operand, OutputStructure, Returned, Tensor,
    trace,
};

/// Values returned by a module, in the shape its forward pass returned
/// them.
#[derive(Debug, Clone)]
pub enum ModuleOutput {
    Single(Tensor),
    Tuple(Vec<Tensor>),
}

impl ModuleOutput {
    /// Output tensors in declaration order.
    pub fn values(&self) -> &[Tensor] {
        match self {
            ModuleOutput::Single(tensor) => std::slice::from_ref(tensor),
            ModuleOutput::Tuple(values) => values,
        }
    }

    pub fn into_values(self) -> Vec<Tensor> {
        match self {
            ModuleOutput::Single(tensor) => vec![tensor],
            ModuleOutput::Tuple(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Elementwise closeness. A one-element tuple compares equal to a
    /// single value.
    pub fn allclose(&self, other: &ModuleOutput) -> bool {
        let (lhs, rhs) = (self.values(), other.values());
        lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(a, b)| a.allclose(b))
    }
}

impl From<Returned<Tensor>> for ModuleOutput {
    fn from(returned: Returned<Tensor>) -> Self {
        match returned {
            Returned::Single(tensor) => ModuleOutput::Single(tensor),
            Returned::Tuple(values) => ModuleOutput::Tuple(values),
        }
    }
}

/// Executes a lowered graph, once per call.
///
/// Each call binds the arguments to the input registers, dispatches every
/// entry in order and reads the declared outputs back. Two output slots
/// reading the same register return clones of one tensor, so they share
/// storage.
#[derive(Debug)]
pub struct CompiledGraphRunner {
    graph: LoweredGraph,
}

impl CompiledGraphRunner {
    pub fn new(graph: LoweredGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &LoweredGraph {
        &self.graph
    }

    /// Number of positional arguments `call` expects.
    pub fn arity(&self) -> usize {
        self.graph.input_count()
    }

    /// Run the graph on `args`.
    #[tracing::instrument(skip_all, fields(entries = self.graph.entries().len()))]
    pub fn call(&self, args: &[Tensor]) -> Result<ModuleOutput> {
        if args.len() != self.arity() {
            return Err(RuntimeError::ArityMismatch {
                expected: self.arity(),
                got: args.len(),
            });
        }

        // Register file: `None` means the register hasn't been written yet.
        let mut registers: Vec<Option<Tensor>> = vec![None; self.graph.num_registers()];
        for (&reg, arg) in self.graph.input_registers().iter().zip(args) {
            *slot(&mut registers, reg)? = Some(arg.clone());
        }

        for entry in self.graph.entries() {
            let inputs = entry
                .operands
                .iter()
                .map(|operand| match *operand {
                    Operand::Register(reg) => read(&registers, reg, &entry.name)
                        .map(DispatchInput::Tensor),
                    Operand::Scalar(scalar) => Ok(DispatchInput::Scalar(scalar)),
                })
                .collect::<Result<Vec<_>>>()?;

            let outputs = entry.op.dispatch(&inputs).map_err(|e| {
                RuntimeError::ExecutionError(format!("Operation '{}' failed: {e}", entry.name))
            })?;

            if outputs.len() != entry.output_regs.len() {
                return Err(RuntimeError::ExecutionError(format!(
                    "Operation '{}' returned {} outputs but expected {}",
                    entry.name,
                    outputs.len(),
                    entry.output_regs.len()
                )));
            }
            for (output, &reg) in outputs.into_iter().zip(&entry.output_regs) {
                *slot(&mut registers, reg)? = Some(output);
            }
        }

        let values = self
            .graph
            .output_registers()
            .iter()
            .map(|&reg| read(&registers, reg, "graph output"))
            .collect::<Result<Vec<_>>>()?;

        match self.graph.output_structure() {
            OutputStructure::Single => {
                let mut values = values.into_iter();
                match (values.next(), values.next()) {
                    (Some(value), None) => Ok(ModuleOutput::Single(value)),
                    _ => Err(RuntimeError::ResultShapeMismatch(format!(
                        "single output declared, {} registers recorded",
                        self.graph.output_registers().len()
                    ))),
                }
            }
            OutputStructure::Tuple(n) if n == values.len() => Ok(ModuleOutput::Tuple(values)),
            OutputStructure::Tuple(n) => Err(RuntimeError::ResultShapeMismatch(format!(
                "tuple of {n} declared, {} registers recorded",
                values.len()
            ))),
        }
    }
}

fn slot(registers: &mut [Option<Tensor>], reg: usize) -> Result<&mut Option<Tensor>> {
    let len = registers.len();
    registers.get_mut(reg).ok_or_else(|| {
        RuntimeError::ExecutionError(format!("Register {reg} out of range ({len} registers)"))
    })
}

fn read(registers: &[Option<Tensor>], reg: usize, reader: &str) -> Result<Tensor> {
    registers.get(reg).cloned().flatten().ok_or_else(|| {
        RuntimeError::ExecutionError(format!(
            "Register {reg} is empty when dispatching '{reader}'"
        ))
    })
}

/// Trace `module`, compile it onto `backend` and return a runner.
///
/// The runner is executed once on `example_args` before it is returned, so
/// a graph that cannot run on arguments like these fails here.
#[tracing::instrument(skip_all, fields(module = module.name(), backend = backend.name()))]
pub fn extract_compiled_graph<M: Module>(
    module: &M,
    example_args: &[Tensor],
    backend: &dyn Backend,
    config: &LazyConfig,
) -> Result<CompiledGraphRunner> {
    if example_args.len() != module.arity() {
        return Err(RuntimeError::ArityMismatch {
            expected: module.arity(),
            got: example_args.len(),
        });
    }

    let graph = trace(module).map_err(lattice_compiler::CompileError::from)?;
    let lowered = CompilerPipeline::new().compile(graph, backend, config)?;
    let runner = CompiledGraphRunner::new(lowered);

    let example = runner.call(example_args)?;
    tracing::debug!(outputs = example.len(), "example call succeeded");
    Ok(runner)
}
