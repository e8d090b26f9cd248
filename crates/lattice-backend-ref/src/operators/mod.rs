//! Kernels that don't fit into a family.

mod addcmul;
mod chunk;

pub use addcmul::AddcmulKernel;
pub use chunk::ChunkKernel;
