//! Compiled-vs-eager verification.
//!
//! Extracts a module once and checks that reusing the compiled graph on
//! fresh random inputs reproduces what eager execution computes.

use crate::error::{Result, RuntimeError};
use crate::runner::{ModuleOutput, extract_compiled_graph};
use lattice_backend_ref::{RefBackend, run_eager};
use lattice_compiler::LazyConfig;
use lattice_core::{Module, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

/// Shape of every generated argument.
pub const SAMPLE_SHAPE: [usize; 2] = [2, 3];

/// How a verification run ended successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Extraction failed with a message matching the expected pattern.
    ExpectedFailure { message: String },

    /// Every sampled case matched eager execution.
    Passed { cases: usize },
}

/// One standard-normal `2x3` tensor per module parameter.
pub fn gen_rand_args<M: Module, R: Rng + ?Sized>(module: &M, rng: &mut R) -> Vec<Tensor> {
    (0..module.arity())
        .map(|_| Tensor::randn(&SAMPLE_SHAPE, rng))
        .collect()
}

/// Verify `module` with entropy-seeded samples.
///
/// See [`verify_reusing_compiled_graph_with_rng`].
pub fn verify_reusing_compiled_graph<M: Module>(
    module: &M,
    backend: &RefBackend,
    config: &LazyConfig,
    expected_error: Option<&Regex>,
    ncase: usize,
) -> Result<VerifyOutcome> {
    let mut rng = StdRng::from_entropy();
    verify_reusing_compiled_graph_with_rng(module, backend, config, expected_error, ncase, &mut rng)
}

/// Extract `module` once, then compare compiled and eager results on
/// `ncase` fresh samples.
///
/// With `expected_error` set, extraction must fail with a message the
/// pattern matches; that ends verification early. Without it, any
/// extraction error is returned unchanged.
#[tracing::instrument(skip_all, fields(module = module.name(), ncase))]
pub fn verify_reusing_compiled_graph_with_rng<M: Module, R: Rng + ?Sized>(
    module: &M,
    backend: &RefBackend,
    config: &LazyConfig,
    expected_error: Option<&Regex>,
    ncase: usize,
    rng: &mut R,
) -> Result<VerifyOutcome> {
    let args = gen_rand_args(module, rng);
    let eager = ModuleOutput::from(run_eager(module, backend, &args)?);
    tracing::debug!(outputs = eager.len(), "eager reference computed");

    let runner = match extract_compiled_graph(module, &args, backend, config) {
        Ok(runner) => runner,
        Err(err) => {
            let Some(pattern) = expected_error else {
                return Err(err);
            };
            let message = err.to_string();
            if !pattern.is_match(&message) {
                return Err(RuntimeError::MessageMismatch {
                    pattern: pattern.as_str().to_string(),
                    message,
                });
            }
            tracing::debug!(%message, "extraction failed as expected");
            return Ok(VerifyOutcome::ExpectedFailure { message });
        }
    };

    if let Some(pattern) = expected_error {
        return Err(RuntimeError::UnexpectedSuccess {
            pattern: pattern.as_str().to_string(),
        });
    }

    let mut failed = Vec::new();
    for case in 0..ncase {
        let sample = gen_rand_args(module, rng);
        let expected = ModuleOutput::from(run_eager(module, backend, &sample)?);
        let actual = runner.call(&sample)?;
        if !expected.allclose(&actual) {
            tracing::warn!(case, ?expected, ?actual, "incorrect results");
            failed.push(case);
        }
    }

    if !failed.is_empty() {
        return Err(RuntimeError::VerificationFailed(format!(
            "Failed {}/{ncase} cases",
            failed.len()
        )));
    }
    Ok(VerifyOutcome::Passed { cases: ncase })
}
