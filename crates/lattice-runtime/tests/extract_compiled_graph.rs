//! Reusing an extracted graph across fresh inputs.
//!
//! Each test extracts a module once and checks the compiled graph against
//! eager execution on ten new samples.

mod common;

use common::{
    ModuleAddcmul, ModuleConstScale, ModuleReturnDupTensor, ModuleReturnMulti, ModuleSub,
    init_tracing,
};
use lattice_backend_ref::RefBackend;
use lattice_compiler::LazyConfig;
use lattice_core::Module;
use lattice_runtime::{RuntimeError, VerifyOutcome, verify_reusing_compiled_graph_with_rng};
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;

fn verify<M: Module>(
    module: &M,
    config: &LazyConfig,
    expected_error: Option<&Regex>,
) -> lattice_runtime::Result<VerifyOutcome> {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(42);
    verify_reusing_compiled_graph_with_rng(
        module,
        &RefBackend::new(),
        config,
        expected_error,
        10,
        &mut rng,
    )
}

#[test]
fn test_sub() {
    let outcome = verify(&ModuleSub, &LazyConfig::new(), None).unwrap();
    assert_eq!(outcome, VerifyOutcome::Passed { cases: 10 });
}

#[test]
fn test_ltc_fallback() {
    let config = LazyConfig::new();
    let _scope = config.force_fallback_scope(["aten::sub"]);
    let pattern = Regex::new("fallback.*aten::sub").unwrap();

    let outcome = verify(&ModuleSub, &config, Some(&pattern)).unwrap();
    let VerifyOutcome::ExpectedFailure { message } = outcome else {
        panic!("expected extraction to fail");
    };
    assert!(message.contains("aten::sub"));
}

#[test]
fn test_const_scale() {
    let outcome = verify(&ModuleConstScale, &LazyConfig::new(), None).unwrap();
    assert_eq!(outcome, VerifyOutcome::Passed { cases: 10 });
}

#[test]
fn test_addcmul() {
    let outcome = verify(&ModuleAddcmul, &LazyConfig::new(), None).unwrap();
    assert_eq!(outcome, VerifyOutcome::Passed { cases: 10 });
}

#[test]
fn test_return_multi() {
    let outcome = verify(&ModuleReturnMulti, &LazyConfig::new(), None).unwrap();
    assert_eq!(outcome, VerifyOutcome::Passed { cases: 10 });
}

#[test]
fn test_return_dup_tensor() {
    let outcome = verify(&ModuleReturnDupTensor, &LazyConfig::new(), None).unwrap();
    assert_eq!(outcome, VerifyOutcome::Passed { cases: 10 });
}

#[test]
fn test_unexpected_success() {
    let pattern = Regex::new("fallback").unwrap();
    let err = verify(&ModuleSub, &LazyConfig::new(), Some(&pattern)).unwrap_err();
    assert!(matches!(err, RuntimeError::UnexpectedSuccess { .. }));
}

#[test]
fn test_message_mismatch() {
    let config = LazyConfig::new().with_force_fallback(["aten::sub"]);
    let pattern = Regex::new("fallback.*aten::mul").unwrap();
    let err = verify(&ModuleSub, &config, Some(&pattern)).unwrap_err();
    assert!(matches!(err, RuntimeError::MessageMismatch { .. }));
}

#[test]
fn test_fallback_without_pattern_is_reraised() {
    let config = LazyConfig::new().with_force_fallback(["operator.sub"]);
    let err = verify(&ModuleSub, &config, None).unwrap_err();
    match err {
        RuntimeError::Compile(e) => assert!(e.is_fallback()),
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn test_scoped_fallback_restored_after_panic() {
    let config = LazyConfig::new();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _scope = config.force_fallback_scope(["aten::sub"]);
        panic!("boom");
    }));
    assert!(result.is_err());
    assert!(config.get_force_fallback().is_empty());

    let outcome = verify(&ModuleSub, &config, None).unwrap();
    assert_eq!(outcome, VerifyOutcome::Passed { cases: 10 });
}
