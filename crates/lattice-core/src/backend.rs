//! Backend capability and lowering traits.
//!
//! A backend answers two questions during extraction: does it natively
//! support an operator (and under which kernel symbol), and how to turn a
//! captured node into an executable [`OpDispatch`]. Extraction asks both for
//! every node; the runner only ever sees the dispatch objects.

use crate::ir::{CapturedGraph, Node, NodeId};
use crate::operator::OpId;
use crate::types::{AttributeValue, Scalar, Tensor};
use crate::{Error, Result};
use std::fmt;

/// Where a lowered op reads one positional argument from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// A tensor held in the given register.
    Register(usize),

    /// Backend scalar data: a host literal that stays a scalar.
    Scalar(Scalar),
}

impl Operand {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Operand::Scalar(_))
    }
}

/// A concrete argument handed to a dispatch at execution time.
#[derive(Debug, Clone)]
pub enum DispatchInput {
    Tensor(Tensor),
    Scalar(Scalar),
}

impl DispatchInput {
    pub fn as_tensor(&self) -> Result<&Tensor> {
        match self {
            DispatchInput::Tensor(t) => Ok(t),
            DispatchInput::Scalar(s) => Err(Error::Kernel(format!(
                "Expected a tensor operand, got scalar {s}"
            ))),
        }
    }

    pub fn as_scalar(&self) -> Result<Scalar> {
        match self {
            DispatchInput::Scalar(s) => Ok(*s),
            DispatchInput::Tensor(t) => Err(Error::Kernel(format!(
                "Expected a scalar operand, got tensor of shape {:?}",
                t.shape()
            ))),
        }
    }
}

/// Runtime operation produced by lowering one node.
///
/// A dispatch captures everything it needs at lowering time (selected
/// overload, attributes) and is invoked once per runner call with
/// concrete inputs. It must not keep per-call state.
pub trait OpDispatch: Send + Sync + fmt::Debug {
    /// Execute the operation, returning one tensor per node output.
    fn dispatch(&self, inputs: &[DispatchInput]) -> Result<Vec<Tensor>>;
}

/// Lowering-time context passed to [`Backend::lower`].
pub struct LowerCtx<'a> {
    /// The node being lowered.
    pub node: &'a Node,

    /// The node id in the captured graph.
    pub node_id: NodeId,

    /// The full captured graph.
    pub graph: &'a CapturedGraph,

    /// Operand routing for each positional argument of `node`.
    pub operands: &'a [Operand],

    /// Kernel symbol the backend reported for this node's operator.
    pub symbol: &'a str,
}

impl<'a> LowerCtx<'a> {
    pub fn op(&self) -> &OpId {
        &self.node.op
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    pub fn output_count(&self) -> usize {
        self.node.num_outputs
    }

    /// Whether the operand at `index` is a host scalar.
    pub fn is_scalar(&self, index: usize) -> Result<bool> {
        self.operands
            .get(index)
            .map(Operand::is_scalar)
            .ok_or_else(|| {
                Error::Lowering(format!(
                    "Operand index {index} out of range ({} has {} operands)",
                    self.symbol,
                    self.operands.len()
                ))
            })
    }

    /// Get a node attribute by name.
    pub fn attr(&self, name: &str) -> Option<&AttributeValue> {
        self.node.attributes.get(name)
    }

    /// Get a required integer attribute.
    pub fn attr_i64(&self, name: &str) -> Result<i64> {
        match self.attr(name) {
            Some(AttributeValue::Int(v)) => Ok(*v),
            _ => Err(Error::Lowering(format!(
                "Missing required i64 attribute '{name}' on {}",
                self.symbol
            ))),
        }
    }

    /// Fail unless the node has exactly `expected` operands.
    pub fn expect_operands(&self, expected: usize) -> Result<()> {
        if self.operands.len() == expected {
            Ok(())
        } else {
            Err(Error::Lowering(format!(
                "{} expects {expected} operands, got {}",
                self.symbol,
                self.operands.len()
            )))
        }
    }
}

/// A lowering target.
pub trait Backend: Send + Sync {
    /// Backend name used in logs and error messages.
    fn name(&self) -> &str;

    /// The backend-qualified kernel name (e.g. `aten::sub`) for `op`, or
    /// `None` if the backend has no native implementation.
    fn kernel_symbol(&self, op: &OpId) -> Option<&str>;

    /// Whether `op` is natively supported.
    fn is_supported(&self, op: &OpId) -> bool {
        self.kernel_symbol(op).is_some()
    }

    /// Lower one supported node into a dispatch object.
    fn lower(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>>;
}
