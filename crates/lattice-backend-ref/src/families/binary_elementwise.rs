//! Binary elementwise kernel family.
//!
//! Covers: add, sub, mul, div

use lattice_core::{DispatchInput, Error, LowerCtx, OpDispatch, Result, Tensor};

use crate::kernel::Kernel;

/// Binary elementwise kernel family.
///
/// All members share the same structure:
/// - NumPy-style broadcasting when both operands are tensors
/// - A scalar overload when one operand is a host literal
///
/// The only difference is the element function.
pub struct BinaryElementwiseKernel {
    symbol: &'static str,
    func: fn(f32, f32) -> f32,
}

impl BinaryElementwiseKernel {
    pub fn add() -> Self {
        Self {
            symbol: "aten::add",
            func: |a, b| a + b,
        }
    }

    pub fn sub() -> Self {
        Self {
            symbol: "aten::sub",
            func: |a, b| a - b,
        }
    }

    pub fn mul() -> Self {
        Self {
            symbol: "aten::mul",
            func: |a, b| a * b,
        }
    }

    pub fn div() -> Self {
        Self {
            symbol: "aten::div",
            func: |a, b| a / b,
        }
    }
}

/// Which overload a lowered binary op runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOverload {
    /// `op.Tensor`: both operands are tensors.
    Tensor,

    /// `op.Scalar`: tensor on the left, host scalar on the right.
    Scalar,

    /// Host scalar on the left, tensor on the right.
    ReverseScalar,
}

impl Kernel for BinaryElementwiseKernel {
    fn symbol(&self) -> &str {
        self.symbol
    }

    fn create_dispatch(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>> {
        ctx.expect_operands(2)?;
        let overload = match (ctx.is_scalar(0)?, ctx.is_scalar(1)?) {
            (false, false) => BinaryOverload::Tensor,
            (false, true) => BinaryOverload::Scalar,
            (true, false) => BinaryOverload::ReverseScalar,
            (true, true) => {
                return Err(Error::Lowering(format!(
                    "{}: at least one operand must be a tensor",
                    self.symbol
                )));
            }
        };

        Ok(Box::new(BinaryElementwiseDispatch {
            symbol: self.symbol,
            overload,
            func: self.func,
        }))
    }
}

/// Runtime dispatch for a binary elementwise op.
#[derive(Debug)]
pub struct BinaryElementwiseDispatch {
    symbol: &'static str,
    overload: BinaryOverload,
    func: fn(f32, f32) -> f32,
}

impl BinaryElementwiseDispatch {
    pub fn overload(&self) -> BinaryOverload {
        self.overload
    }
}

impl OpDispatch for BinaryElementwiseDispatch {
    fn dispatch(&self, inputs: &[DispatchInput]) -> Result<Vec<Tensor>> {
        let [lhs, rhs] = inputs else {
            return Err(Error::Kernel(format!(
                "{}: expected 2 inputs, got {}",
                self.symbol,
                inputs.len()
            )));
        };

        let func = self.func;
        let output = match self.overload {
            BinaryOverload::Tensor => lhs.as_tensor()?.zip_with(rhs.as_tensor()?, func)?,
            BinaryOverload::Scalar => {
                let b = rhs.as_scalar()?.as_f32();
                lhs.as_tensor()?.map(|a| func(a, b))
            }
            BinaryOverload::ReverseScalar => {
                let a = lhs.as_scalar()?.as_f32();
                rhs.as_tensor()?.map(|b| func(a, b))
            }
        };
        Ok(vec![output])
    }
}
