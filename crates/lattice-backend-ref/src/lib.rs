//! CPU reference backend for Lattice.
//!
//! Kernels are grouped into collapsed families where operators share their
//! structure and differ only in the element function:
//!
//! - **Binary elementwise**: add, sub, mul, div (tensor and scalar overloads)
//! - **Unary elementwise**: neg, relu, sigmoid, tanh
//!
//! Operators that don't fit a family:
//! - `addcmul` (three tensors and a scalar `value`)
//! - `chunk` (multiple outputs along dimension 0)
//!
//! [`RefBackend`] implements the lowering [`Backend`](lattice_core::Backend)
//! trait on top of [`core_kernel_registry`]. [`Eager`] runs the same
//! kernels immediately, which gives the ground truth extracted graphs are
//! compared against.

pub mod backend;
pub mod eager;
pub mod families;
pub mod kernel;
pub mod operators;

mod registry;

pub use backend::RefBackend;
pub use eager::{Eager, run_eager};
pub use families::{BinaryElementwiseKernel, UnaryElementwiseKernel};
pub use kernel::{Kernel, KernelRegistry};
pub use registry::core_kernel_registry;
