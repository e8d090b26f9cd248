//! Error types for lattice-compiler.

use crate::extractor::ExtractorState;
use lattice_core::OpId;
use lattice_quant::QuantError;
use thiserror::Error;

/// Errors that can occur while compiling a captured graph.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The backend cannot run a node natively, or the node was forced onto
    /// the fallback path.
    ///
    /// The message names the backend kernel symbol so callers can match on
    /// it (`fallback.*aten::sub`).
    #[error("{message}")]
    Fallback {
        symbol: String,
        op: OpId,
        message: String,
    },

    /// An extractor was asked to run again after it finished.
    #[error("Extractor cannot run from state {0:?}")]
    InvalidState(ExtractorState),

    #[error(transparent)]
    Core(#[from] lattice_core::Error),

    #[error(transparent)]
    Quant(#[from] QuantError),
}

impl CompileError {
    /// Whether this error was caused by an op needing the fallback path.
    pub fn is_fallback(&self) -> bool {
        matches!(self, CompileError::Fallback { .. })
    }
}

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;
