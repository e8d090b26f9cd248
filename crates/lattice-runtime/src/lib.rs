//! Executor for compiled Lattice graphs.
//!
//! This crate runs the lowered graphs produced by `lattice-compiler`.
//!
//! # Architecture
//!
//! The runtime has two responsibilities:
//! 1. **Execution** - [`CompiledGraphRunner`] dispatches lowered entries through
//!    a per-call register file and rebuilds the module's return structure
//! 2. **Verification** - [`verify_reusing_compiled_graph`] checks a compiled
//!    graph against eager execution on fresh random inputs
//!
//! # Example
//!
//! ```ignore
//! use lattice_backend_ref::RefBackend;
//! use lattice_compiler::LazyConfig;
//! use lattice_runtime::extract_compiled_graph;
//!
//! let backend = RefBackend::new();
//! let runner = extract_compiled_graph(&module, &example_args, &backend, &LazyConfig::new())?;
//! let outputs = runner.call(&args)?;
//! println!("{} outputs", outputs.len());
//! ```

mod error;
mod runner;
mod verify;

pub use error::{Result, RuntimeError};
pub use runner::{CompiledGraphRunner, ModuleOutput, extract_compiled_graph};
pub use verify::{
    SAMPLE_SHAPE, VerifyOutcome, gen_rand_args, verify_reusing_compiled_graph,
    verify_reusing_compiled_graph_with_rng,
};
