//! Backend extraction: captured graph to lowered graph.
//!
//! The extractor walks a captured graph in capture order and lowers every
//! node through a [`Backend`]. Extraction is all-or-nothing: the first node
//! the backend cannot run (or that the [`LazyConfig`] forces onto the
//! fallback path) aborts the walk with [`CompileError::Fallback`].
//!
//! Register layout of the produced [`LoweredGraph`]:
//! - registers `0..n` hold the module's positional inputs, in parameter order
//! - every `(node, output)` pair gets the next free register
//! - output slots read the register of the value they declare, so a value
//!   returned twice is read from one register twice

use crate::config::LazyConfig;
use crate::error::{CompileError, Result};
use lattice_core::{
    Argument, Backend, CapturedGraph, LowerCtx, LoweredEntry, LoweredGraph, Node, NodeId,
    Operand, ValueRef,
};
use lattice_quant::{GraphMatches, PatternMatcher, PatternTable};
use std::collections::HashMap;

/// Progress of a [`BackendExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    NotStarted,
    Walking,
    Completed,
    Failed,
}

/// Lowers one captured graph onto one backend.
pub struct BackendExtractor<'a> {
    backend: &'a dyn Backend,
    config: &'a LazyConfig,
    table: Option<&'a PatternTable>,
    state: ExtractorState,
}

impl<'a> BackendExtractor<'a> {
    pub fn new(backend: &'a dyn Backend, config: &'a LazyConfig) -> Self {
        Self {
            backend,
            config,
            table: None,
            state: ExtractorState::NotStarted,
        }
    }

    /// Annotate lowered entries with the patterns they match in `table`.
    pub fn with_pattern_table(mut self, table: &'a PatternTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn state(&self) -> ExtractorState {
        self.state
    }

    /// Walk `graph` and lower it.
    ///
    /// An extractor runs once; calling this again returns
    /// [`CompileError::InvalidState`].
    #[tracing::instrument(skip_all, fields(backend = self.backend.name(), nodes = graph.node_count()))]
    pub fn extract(&mut self, graph: &CapturedGraph) -> Result<LoweredGraph> {
        if self.state != ExtractorState::NotStarted {
            return Err(CompileError::InvalidState(self.state));
        }
        self.state = ExtractorState::Walking;

        match self.walk(graph) {
            Ok(lowered) => {
                self.state = ExtractorState::Completed;
                tracing::debug!(entries = lowered.entries().len(), "extraction complete");
                Ok(lowered)
            }
            Err(e) => {
                self.state = ExtractorState::Failed;
                Err(e)
            }
        }
    }

    fn walk(&self, graph: &CapturedGraph) -> Result<LoweredGraph> {
        graph.validate()?;

        let matches = self
            .table
            .map(|table| PatternMatcher::new(table).match_graph(graph))
            .transpose()?;

        let num_inputs = graph.num_inputs();
        let mut registers: HashMap<ValueRef, usize> =
            (0..num_inputs).map(|i| (ValueRef::Input(i), i)).collect();
        let mut next_register = num_inputs;
        let mut entries = Vec::with_capacity(graph.node_count());

        for (id, node) in graph.nodes() {
            let _span = tracing::debug_span!("lower", node = %node.name, op = %node.op).entered();

            let symbol = match self.backend.kernel_symbol(&node.op) {
                Some(symbol) if !self.config.is_forced(Some(symbol), &node.op) => symbol,
                unsupported => return Err(self.fallback(node, unsupported)),
            };

            let operands = node
                .args
                .iter()
                .map(|arg| match arg {
                    Argument::Value(value) => registers
                        .get(value)
                        .copied()
                        .map(Operand::Register)
                        .ok_or_else(|| {
                            lattice_core::Error::Lowering(format!(
                                "Node '{}' reads {value:?}, which has no register",
                                node.name
                            ))
                        }),
                    Argument::Scalar(scalar) => Ok(Operand::Scalar(*scalar)),
                })
                .collect::<lattice_core::Result<Vec<_>>>()?;

            let ctx = LowerCtx {
                node,
                node_id: id,
                graph,
                operands: &operands,
                symbol,
            };
            let op = self.backend.lower(&ctx)?;

            let output_regs: Vec<usize> = (0..node.num_outputs)
                .map(|output| {
                    let reg = next_register;
                    registers.insert(ValueRef::Node { node: id, output }, reg);
                    next_register += 1;
                    reg
                })
                .collect();

            entries.push(LoweredEntry {
                op,
                operands,
                output_regs,
                name: node.name.clone(),
                source_op: node.op.clone(),
                symbol: symbol.to_string(),
                pattern: match &matches {
                    Some(matches) => annotate(matches, graph, id)?,
                    None => None,
                },
            });
        }

        let output_registers = graph
            .outputs()
            .iter()
            .map(|value| {
                registers.get(value).copied().ok_or_else(|| {
                    lattice_core::Error::Lowering(format!(
                        "Graph output {value:?} has no register"
                    ))
                })
            })
            .collect::<lattice_core::Result<Vec<_>>>()?;

        Ok(LoweredGraph::new(
            self.backend.name(),
            entries,
            next_register,
            (0..num_inputs).collect(),
            output_registers,
            graph.output_structure(),
        )?)
    }

    fn fallback(&self, node: &Node, symbol: Option<&str>) -> CompileError {
        let traced = node.op.qualified_name();
        let symbol = symbol.map_or_else(|| traced.clone(), str::to_string);
        let message = format!(
            "{} backend requires fallback for {symbol} (traced as {traced})",
            self.backend.name()
        );
        tracing::warn!(node = %node.name, %symbol, "{message}");
        CompileError::Fallback {
            symbol,
            op: node.op.clone(),
            message,
        }
    }
}

/// Render the pattern covering `node`, with its observation type when the
/// strategy resolves one.
fn annotate(matches: &GraphMatches<'_>, graph: &CapturedGraph, node: NodeId) -> Result<Option<String>> {
    let Some(found) = matches.for_node(node) else {
        return Ok(None);
    };
    let label = match found.observation_type(graph)? {
        Some(observation) => format!("{} [{observation:?}]", found.pattern),
        None => found.pattern.to_string(),
    };
    Ok(Some(label))
}
