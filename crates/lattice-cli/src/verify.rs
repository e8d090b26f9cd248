//! `lattice verify`: compile the demo modules and compare against eager.

use crate::demo::DemoModule;
use lattice_backend_ref::RefBackend;
use lattice_compiler::LazyConfig;
use lattice_core::Module;
use lattice_runtime::{RuntimeError, VerifyOutcome, verify_reusing_compiled_graph_with_rng};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;

/// Result of verifying one demo module.
#[derive(Debug)]
pub enum Status {
    Passed { cases: usize },
    /// Extraction hit an op that must run on the fallback path.
    Fallback { message: String },
    Failed { error: RuntimeError },
}

#[derive(Debug)]
pub struct Report {
    pub module: &'static str,
    pub status: Status,
}

impl Report {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, Status::Failed { .. })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Status::Passed { cases } => write!(f, "PASS     {} ({cases} cases)", self.module),
            Status::Fallback { message } => write!(f, "FALLBACK {}: {message}", self.module),
            Status::Failed { error } => write!(f, "FAIL     {}: {error}", self.module),
        }
    }
}

/// Verify every demo module. Each module draws from its own generator
/// seeded from `seed`, so results do not depend on module order.
pub fn run(config: &LazyConfig, cases: usize, seed: u64) -> Vec<Report> {
    let backend = RefBackend::new();
    DemoModule::ALL
        .iter()
        .enumerate()
        .map(|(i, module)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let _span = tracing::info_span!("verify", module = module.name()).entered();
            let outcome =
                verify_reusing_compiled_graph_with_rng(module, &backend, config, None, cases, &mut rng);
            let status = match outcome {
                Ok(VerifyOutcome::Passed { cases }) => Status::Passed { cases },
                Ok(VerifyOutcome::ExpectedFailure { message }) => Status::Fallback { message },
                Err(RuntimeError::Compile(e)) if e.is_fallback() => Status::Fallback {
                    message: e.to_string(),
                },
                Err(error) => Status::Failed { error },
            };
            Report {
                module: module.label(),
                status,
            }
        })
        .collect()
}
