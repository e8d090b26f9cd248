//! Error types for the runtime crate.

use lattice_compiler::CompileError;
use thiserror::Error;

/// Runtime execution and verification errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A runner was called with the wrong number of arguments.
    #[error("Expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// The recorded return structure disagrees with the produced values.
    #[error("Result shape mismatch: {0}")]
    ResultShapeMismatch(String),

    /// Execution failed.
    #[error("Execution failed: {0}")]
    ExecutionError(String),

    /// Tracing or extraction failed.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Eager evaluation failed.
    #[error(transparent)]
    Core(#[from] lattice_core::Error),

    /// Compiled results disagree with eager results.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Extraction succeeded although an error was expected.
    #[error("Expected an extraction error matching '{pattern}', but extraction succeeded")]
    UnexpectedSuccess { pattern: String },

    /// Extraction failed with a message not matching the expected pattern.
    #[error("Extraction error does not match '{pattern}': {message}")]
    MessageMismatch { pattern: String, message: String },
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
