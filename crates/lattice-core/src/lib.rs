//! Core graph representation, tensors, and backend traits for Lattice.
//!
//! This crate provides the foundational abstractions that all other Lattice crates depend on:
//! - Operator identifiers (`OpId`) shared by the tracer, the pattern tables and the backends
//! - A minimal host tensor (`Tensor`) and literal scalars (`Scalar`)
//! - The captured dataflow graph (`CapturedGraph`, `Node`, `ValueRef`)
//! - The tracing frontend (`Frontend`, `Module`, `Tracer`)
//! - Backend lowering and dispatch traits (`Backend`, `OpDispatch`)
//! - The immutable lowered graph produced by extraction (`LoweredGraph`)
//! - Graph pass trait for rewrites that run before lowering

pub mod backend;
pub mod broadcast;
pub mod dispatch;
pub mod ir;
pub mod ir_builder;
pub mod operator;
pub mod pass;
pub mod types;

// Re-export commonly used types
pub use backend::{Backend, DispatchInput, LowerCtx, OpDispatch, Operand};
pub use broadcast::broadcast_shape;
pub use dispatch::{LoweredEntry, LoweredGraph};
pub use ir::{Argument, CapturedGraph, Node, NodeId, OutputStructure, ValueRef};
pub use ir_builder::{Arg, Call, Frontend, FrontendExt, Module, Returned, Tracer, trace};
pub use operator::OpId;
pub use pass::{Pass, Stage};
pub use types::{AttributeValue, DataType, Scalar, Tensor};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lattice-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Tracing error: {0}")]
    Trace(String),

    #[error("Lowering error: {0}")]
    Lowering(String),

    #[error("Kernel error: {0}")]
    Kernel(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Shape error: {0}")]
    Shape(String),
}
