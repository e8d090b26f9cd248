//! Graph compiler for Lattice.
//!
//! This crate takes a [`CapturedGraph`] and turns it into a [`LoweredGraph`]
//! that `lattice-runtime` can execute repeatedly.
//!
//! Compilation runs in two phases:
//! 1. **Passes** - graph rewrites grouped by [`Stage`]: `Cleanup` (dead code
//!    elimination) then `Optimization` (pattern fusion, custom passes)
//! 2. **Extraction** - the [`BackendExtractor`] walks the rewritten graph and
//!    lowers every node through a [`Backend`], failing with
//!    [`CompileError::Fallback`] on the first node that must fall back
//!
//! # Example
//!
//! ```ignore
//! use lattice_compiler::{CompilerPipeline, LazyConfig};
//! use lattice_backend_ref::RefBackend;
//!
//! let graph = lattice_core::trace(&module)?;
//! let backend = RefBackend::new();
//! let config = LazyConfig::from_env();
//! let lowered = CompilerPipeline::new().compile(graph, &backend, &config)?;
//! println!("Lowered {} entries", lowered.entries().len());
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod passes;

pub use config::{FORCE_FALLBACK_ENV, ForceFallbackScope, LazyConfig, parse_op_list};
pub use error::{CompileError, Result};
pub use extractor::{BackendExtractor, ExtractorState};
pub use passes::{DeadCodeEliminationPass, FusionPass};

// Re-export commonly used types from lattice-core
pub use lattice_core::{Backend, CapturedGraph, LoweredGraph, Pass, Stage};

use lattice_quant::PatternTable;

/// Compiler pipeline with pluggable passes.
///
/// Passes run in stage order (`Cleanup` then `Optimization`); within a
/// stage they run in registration order. Dead code elimination is
/// registered by default, fusion and other rewrites are added via
/// `add_pass()`.
pub struct CompilerPipeline {
    /// All passes to run, ordered by (stage, registration order).
    passes: Vec<Box<dyn Pass>>,

    /// Table used to annotate lowered entries, if any.
    annotations: Option<PatternTable>,
}

impl CompilerPipeline {
    /// Create a pipeline with the built-in `DeadCodeEliminationPass`.
    pub fn new() -> Self {
        let mut pipeline = Self::empty();
        pipeline.add_pass(DeadCodeEliminationPass::new());
        pipeline
    }

    /// Create a pipeline with no passes at all.
    pub fn empty() -> Self {
        Self {
            passes: Vec::new(),
            annotations: None,
        }
    }

    /// Add a custom pass to the pipeline.
    ///
    /// The pass will be inserted into the stage reported by `pass.stage()`.
    ///
    /// # Returns
    ///
    /// Returns a mutable reference to self for method chaining.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Annotate lowered entries with the patterns they match in `table`.
    pub fn annotate_with(&mut self, table: PatternTable) -> &mut Self {
        self.annotations = Some(table);
        self
    }

    /// Names of the registered passes in the order they will run.
    pub fn pass_names(&self) -> Vec<&str> {
        let mut passes: Vec<&dyn Pass> = self.passes.iter().map(|p| p.as_ref()).collect();
        passes.sort_by_key(|p| p.stage());
        passes.into_iter().map(|p| p.name()).collect()
    }

    /// Run all passes over `graph`, then extract it onto `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - any pass fails
    /// - a node must fall back (`CompileError::Fallback`)
    /// - the backend fails to lower a supported node
    #[tracing::instrument(skip_all, fields(backend = backend.name(), nodes = graph.node_count()))]
    pub fn compile(
        &mut self,
        mut graph: CapturedGraph,
        backend: &dyn Backend,
        config: &LazyConfig,
    ) -> Result<LoweredGraph> {
        self.passes.sort_by_key(|p| p.stage());

        for pass in &self.passes {
            let _span =
                tracing::debug_span!("pass", name = pass.name(), stage = ?pass.stage()).entered();
            let changed = pass.run(&mut graph)?;
            tracing::debug!(changed, nodes = graph.node_count(), "pass finished");
        }

        let mut extractor = BackendExtractor::new(backend, config);
        if let Some(table) = &self.annotations {
            extractor = extractor.with_pattern_table(table);
        }
        extractor.extract(&graph)
    }
}

impl Default for CompilerPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a captured graph with the default pipeline.
pub fn compile(
    graph: CapturedGraph,
    backend: &dyn Backend,
    config: &LazyConfig,
) -> Result<LoweredGraph> {
    CompilerPipeline::new().compile(graph, backend, config)
}
