//! Unary elementwise kernel family.
//!
//! Covers: neg, relu, sigmoid, tanh

use lattice_core::{DispatchInput, Error, LowerCtx, OpDispatch, Result, Tensor};

use crate::kernel::Kernel;

/// Unary elementwise kernel family.
///
/// Output shape equals input shape; members differ only in the element
/// function.
pub struct UnaryElementwiseKernel {
    symbol: &'static str,
    func: fn(f32) -> f32,
}

impl UnaryElementwiseKernel {
    pub fn neg() -> Self {
        Self {
            symbol: "aten::neg",
            func: |x| -x,
        }
    }

    pub fn relu() -> Self {
        Self {
            symbol: "aten::relu",
            func: |x| x.max(0.0),
        }
    }

    pub fn sigmoid() -> Self {
        Self {
            symbol: "aten::sigmoid",
            func: |x| 1.0 / (1.0 + (-x).exp()),
        }
    }

    pub fn tanh() -> Self {
        Self {
            symbol: "aten::tanh",
            func: f32::tanh,
        }
    }
}

impl Kernel for UnaryElementwiseKernel {
    fn symbol(&self) -> &str {
        self.symbol
    }

    fn create_dispatch(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>> {
        ctx.expect_operands(1)?;
        if ctx.is_scalar(0)? {
            return Err(Error::Lowering(format!(
                "{}: operand must be a tensor",
                self.symbol
            )));
        }
        Ok(Box::new(UnaryElementwiseDispatch {
            symbol: self.symbol,
            func: self.func,
        }))
    }
}

#[derive(Debug)]
struct UnaryElementwiseDispatch {
    symbol: &'static str,
    func: fn(f32) -> f32,
}

impl OpDispatch for UnaryElementwiseDispatch {
    fn dispatch(&self, inputs: &[DispatchInput]) -> Result<Vec<Tensor>> {
        let [input] = inputs else {
            return Err(Error::Kernel(format!(
                "{}: expected 1 input, got {}",
                self.symbol,
                inputs.len()
            )));
        };
        Ok(vec![input.as_tensor()?.map(self.func)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kernel: UnaryElementwiseKernel, data: Vec<f32>) -> Vec<f32> {
        let dispatch = UnaryElementwiseDispatch {
            symbol: kernel.symbol,
            func: kernel.func,
        };
        let n = data.len();
        let input = Tensor::from_vec(data, &[n]).unwrap();
        dispatch.dispatch(&[DispatchInput::Tensor(input)]).unwrap()[0]
            .data()
            .to_vec()
    }

    #[test]
    fn test_relu() {
        assert_eq!(
            run(UnaryElementwiseKernel::relu(), vec![-1.0, 0.0, 2.5]),
            vec![0.0, 0.0, 2.5]
        );
    }

    #[test]
    fn test_neg() {
        assert_eq!(run(UnaryElementwiseKernel::neg(), vec![1.0, -3.0]), vec![-1.0, 3.0]);
    }

    #[test]
    fn test_sigmoid_at_zero() {
        assert_eq!(run(UnaryElementwiseKernel::sigmoid(), vec![0.0]), vec![0.5]);
    }
}
