//! Graph pass trait and stage definitions.

use crate::Result;
use crate::ir::CapturedGraph;

/// Stage a pass runs in.
///
/// Passes are grouped into stages and run in a fixed order before
/// lowering. Within each stage, passes run in the order they were
/// registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Remove computation nothing observes.
    ///
    /// Runs first so that dead users do not block single-consumer chain
    /// matching in later stages.
    Cleanup,

    /// Graph rewriting (pattern fusion and similar).
    Optimization,
}

/// A graph transformation run before lowering.
///
/// `run()` returns `Ok(true)` if the pass changed the graph and
/// `Ok(false)` otherwise.
///
/// # Example
///
/// ```ignore
/// struct NoOpPass;
///
/// impl Pass for NoOpPass {
///     fn name(&self) -> &str {
///         "noop"
///     }
///
///     fn stage(&self) -> Stage {
///         Stage::Optimization
///     }
///
///     fn run(&self, graph: &mut CapturedGraph) -> Result<bool> {
///         Ok(false)
///     }
/// }
/// ```
pub trait Pass: Send + Sync {
    /// Pass name (used for logging and debugging).
    fn name(&self) -> &str;

    /// Stage this pass belongs to.
    fn stage(&self) -> Stage;

    /// Run the pass on the given graph.
    fn run(&self, graph: &mut CapturedGraph) -> Result<bool>;
}
