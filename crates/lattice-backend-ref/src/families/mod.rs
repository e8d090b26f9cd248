//! Collapsed kernel families.
//!
//! These families group similar operators together, implementing shared logic once
//! and parameterizing only the element function.

pub mod binary_elementwise;
pub mod unary_elementwise;

pub use binary_elementwise::BinaryElementwiseKernel;
pub use unary_elementwise::UnaryElementwiseKernel;
