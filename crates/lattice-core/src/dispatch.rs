//! Lowered, executable graph.
//!
//! A `LoweredGraph` is a flat sequence of dispatch entries with
//! register-based value routing. Every value the graph computes lives in one
//! register; graph inputs are bound to registers before execution and graph
//! outputs are read back from registers afterwards. Two output slots that
//! refer to the same captured value hold the same register index, which is
//! how aliasing survives lowering.

use crate::backend::{OpDispatch, Operand};
use crate::ir::OutputStructure;
use crate::operator::OpId;
use crate::{Error, Result};

/// A single operation in the dispatch sequence.
#[derive(Debug)]
pub struct LoweredEntry {
    /// The dispatch implementation.
    pub op: Box<dyn OpDispatch>,

    /// Where each positional argument is read from.
    pub operands: Vec<Operand>,

    /// Register indices to write outputs to.
    pub output_regs: Vec<usize>,

    /// Captured node name, for debugging.
    pub name: String,

    /// The operator the captured node called.
    pub source_op: OpId,

    /// Backend kernel symbol the node lowered to.
    pub symbol: String,

    /// Quantization pattern the node matched, if a table was consulted.
    pub pattern: Option<String>,
}

/// A lowered graph ready for repeated execution.
///
/// Immutable once built: runners share it across calls and never mutate
/// its structure.
#[derive(Debug)]
pub struct LoweredGraph {
    backend: String,
    entries: Vec<LoweredEntry>,
    num_registers: usize,
    input_registers: Vec<usize>,
    output_registers: Vec<usize>,
    output_structure: OutputStructure,
}

impl LoweredGraph {
    /// Assemble a lowered graph, checking that all routing stays within
    /// `num_registers` and matches the output structure.
    pub fn new(
        backend: impl Into<String>,
        entries: Vec<LoweredEntry>,
        num_registers: usize,
        input_registers: Vec<usize>,
        output_registers: Vec<usize>,
        output_structure: OutputStructure,
    ) -> Result<Self> {
        let in_range = |reg: usize| {
            if reg < num_registers {
                Ok(())
            } else {
                Err(Error::Lowering(format!(
                    "Register {reg} out of range ({num_registers} registers)"
                )))
            }
        };

        for &reg in input_registers.iter().chain(&output_registers) {
            in_range(reg)?;
        }
        for entry in &entries {
            for &reg in &entry.output_regs {
                in_range(reg)?;
            }
            for operand in &entry.operands {
                if let Operand::Register(reg) = *operand {
                    in_range(reg)?;
                }
            }
        }
        if output_registers.len() != output_structure.len() {
            return Err(Error::Lowering(format!(
                "Output structure {output_structure:?} does not match {} output registers",
                output_registers.len()
            )));
        }

        Ok(Self {
            backend: backend.into(),
            entries,
            num_registers,
            input_registers,
            output_registers,
            output_structure,
        })
    }

    /// Name of the backend that produced this graph.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn entries(&self) -> &[LoweredEntry] {
        &self.entries
    }

    pub fn num_registers(&self) -> usize {
        self.num_registers
    }

    /// Registers bound to the module's positional inputs, in order.
    pub fn input_registers(&self) -> &[usize] {
        &self.input_registers
    }

    /// Registers read back for each declared output slot (may repeat).
    pub fn output_registers(&self) -> &[usize] {
        &self.output_registers
    }

    pub fn output_structure(&self) -> OutputStructure {
        self.output_structure
    }

    pub fn input_count(&self) -> usize {
        self.input_registers.len()
    }
}
