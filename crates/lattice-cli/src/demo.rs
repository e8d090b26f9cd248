//! Built-in modules exercised by `lattice verify`.

use lattice_core::{Frontend, FrontendExt, Module, Result, Returned};

/// The verification demo modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoModule {
    /// `a - b`
    Sub,
    /// `a * 2`
    ConstScale,
    /// `torch.addcmul(a, b, c, value=5)`
    Addcmul,
    /// `(b + 1, a - 1)`
    ReturnMulti,
    /// `c = a + b; (a - b, c, a + 1, c)`
    ReturnDupTensor,
    /// `(relu(a), neg(b))` on the two halves of `a`
    SplitActivate,
}

impl DemoModule {
    pub const ALL: [DemoModule; 6] = [
        DemoModule::Sub,
        DemoModule::ConstScale,
        DemoModule::Addcmul,
        DemoModule::ReturnMulti,
        DemoModule::ReturnDupTensor,
        DemoModule::SplitActivate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DemoModule::Sub => "ModuleSub",
            DemoModule::ConstScale => "ModuleConstScale",
            DemoModule::Addcmul => "ModuleAddcmul",
            DemoModule::ReturnMulti => "ModuleReturnMulti",
            DemoModule::ReturnDupTensor => "ModuleReturnDupTensor",
            DemoModule::SplitActivate => "ModuleSplitActivate",
        }
    }
}

impl Module for DemoModule {
    fn name(&self) -> &str {
        self.label()
    }

    fn arity(&self) -> usize {
        match self {
            DemoModule::ConstScale | DemoModule::SplitActivate => 1,
            DemoModule::Sub | DemoModule::ReturnMulti | DemoModule::ReturnDupTensor => 2,
            DemoModule::Addcmul => 3,
        }
    }

    fn forward<F: Frontend>(&self, f: &mut F, args: &[F::Value]) -> Result<Returned<F::Value>> {
        match self {
            DemoModule::Sub => Ok(Returned::Single(f.sub(&args[0], &args[1])?)),
            DemoModule::ConstScale => Ok(Returned::Single(f.mul_scalar(&args[0], 2i64)?)),
            DemoModule::Addcmul => Ok(Returned::Single(f.addcmul(
                &args[0], &args[1], &args[2], 5i64,
            )?)),
            DemoModule::ReturnMulti => {
                let first = f.add_scalar(&args[1], 1i64)?;
                let second = f.sub_scalar(&args[0], 1i64)?;
                Ok(Returned::Tuple(vec![first, second]))
            }
            DemoModule::ReturnDupTensor => {
                let c = f.add(&args[0], &args[1])?;
                let diff = f.sub(&args[0], &args[1])?;
                let inc = f.add_scalar(&args[0], 1i64)?;
                Ok(Returned::Tuple(vec![diff, c.clone(), inc, c]))
            }
            DemoModule::SplitActivate => {
                let halves = f.chunk(&args[0], 2)?;
                let top = f.relu(&halves[0])?;
                let bottom = f.neg(&halves[1])?;
                Ok(Returned::Tuple(vec![top, bottom]))
            }
        }
    }
}
