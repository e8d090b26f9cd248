//! Addcmul kernel.

use lattice_core::{DispatchInput, Error, LowerCtx, OpDispatch, Result, Tensor};

use crate::kernel::Kernel;

/// `out = input + value * tensor1 * tensor2`, broadcasting all three.
///
/// `value` is the fourth positional operand and must stay a host scalar.
pub struct AddcmulKernel;

impl Kernel for AddcmulKernel {
    fn symbol(&self) -> &str {
        "aten::addcmul"
    }

    fn create_dispatch(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>> {
        ctx.expect_operands(4)?;
        for i in 0..3 {
            if ctx.is_scalar(i)? {
                return Err(Error::Lowering(format!(
                    "aten::addcmul: operand {i} must be a tensor"
                )));
            }
        }
        if !ctx.is_scalar(3)? {
            return Err(Error::Lowering(
                "aten::addcmul: value must be a scalar".to_string(),
            ));
        }
        Ok(Box::new(AddcmulDispatch))
    }
}

#[derive(Debug)]
struct AddcmulDispatch;

impl OpDispatch for AddcmulDispatch {
    fn dispatch(&self, inputs: &[DispatchInput]) -> Result<Vec<Tensor>> {
        let [input, tensor1, tensor2, value] = inputs else {
            return Err(Error::Kernel(format!(
                "aten::addcmul: expected 4 inputs, got {}",
                inputs.len()
            )));
        };

        let value = value.as_scalar()?.as_f32();
        let product = tensor1
            .as_tensor()?
            .zip_with(tensor2.as_tensor()?, |a, b| value * a * b)?;
        let output = input.as_tensor()?.zip_with(&product, |a, b| a + b)?;
        Ok(vec![output])
    }
}
