//! Chunk kernel.

use lattice_core::{DispatchInput, Error, LowerCtx, OpDispatch, Result, Tensor};

use crate::kernel::Kernel;

/// Splits the input along dimension 0.
///
/// The `chunks` attribute fixes the number of outputs at trace time.
/// Every call must produce exactly that many pieces; an input too short
/// to split that way is a kernel error.
pub struct ChunkKernel;

impl Kernel for ChunkKernel {
    fn symbol(&self) -> &str {
        "aten::chunk"
    }

    fn create_dispatch(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>> {
        ctx.expect_operands(1)?;
        let chunks = ctx.attr_i64("chunks")?;
        if chunks <= 0 || chunks as usize != ctx.output_count() {
            return Err(Error::Lowering(format!(
                "aten::chunk: chunks={chunks} does not match {} outputs",
                ctx.output_count()
            )));
        }
        Ok(Box::new(ChunkDispatch {
            chunks: chunks as usize,
        }))
    }
}

#[derive(Debug)]
struct ChunkDispatch {
    chunks: usize,
}

impl OpDispatch for ChunkDispatch {
    fn dispatch(&self, inputs: &[DispatchInput]) -> Result<Vec<Tensor>> {
        let [input] = inputs else {
            return Err(Error::Kernel(format!(
                "aten::chunk: expected 1 input, got {}",
                inputs.len()
            )));
        };

        let pieces = input.as_tensor()?.chunk(self.chunks)?;
        if pieces.len() != self.chunks {
            return Err(Error::Kernel(format!(
                "aten::chunk: input of shape {:?} yields {} chunks, {} expected",
                input.as_tensor()?.shape(),
                pieces.len(),
                self.chunks
            )));
        }
        Ok(pieces)
    }
}
