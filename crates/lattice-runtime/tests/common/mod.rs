//! Modules shared by the runtime integration tests.

#![allow(dead_code)]

use lattice_core::{Frontend, FrontendExt, Module, Result, Returned};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// `a * 2`, with the scale kept as a host integer.
pub struct ModuleConstScale;

impl Module for ModuleConstScale {
    fn name(&self) -> &str {
        "ModuleConstScale"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>> {
        Ok(Returned::Single(f.mul_scalar(&args[0], 2i64)?))
    }
}

/// `a - b`
pub struct ModuleSub;

impl Module for ModuleSub {
    fn name(&self) -> &str {
        "ModuleSub"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>> {
        Ok(Returned::Single(f.sub(&args[0], &args[1])?))
    }
}

/// `torch.addcmul(a, b, c, value=5)`: the value is a scalar operand, not a
/// tensor.
pub struct ModuleAddcmul;

impl Module for ModuleAddcmul {
    fn name(&self) -> &str {
        "ModuleAddcmul"
    }

    fn arity(&self) -> usize {
        3
    }

    fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>> {
        Ok(Returned::Single(f.addcmul(&args[0], &args[1], &args[2], 5i64)?))
    }
}

/// `(b + 1, a - 1)`
pub struct ModuleReturnMulti;

impl Module for ModuleReturnMulti {
    fn name(&self) -> &str {
        "ModuleReturnMulti"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>> {
        let first = f.add_scalar(&args[1], 1i64)?;
        let second = f.sub_scalar(&args[0], 1i64)?;
        Ok(Returned::Tuple(vec![first, second]))
    }
}

/// `c = a + b; (a - b, c, a + 1, c)`: the same value is returned twice.
pub struct ModuleReturnDupTensor;

impl Module for ModuleReturnDupTensor {
    fn name(&self) -> &str {
        "ModuleReturnDupTensor"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>> {
        let c = f.add(&args[0], &args[1])?;
        let diff = f.sub(&args[0], &args[1])?;
        let inc = f.add_scalar(&args[0], 1i64)?;
        Ok(Returned::Tuple(vec![diff, c.clone(), inc, c]))
    }
}
