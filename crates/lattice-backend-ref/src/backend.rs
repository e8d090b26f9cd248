//! The reference lowering backend.

use lattice_core::{Backend, Error, LowerCtx, OpDispatch, OpId, Result};

use crate::kernel::KernelRegistry;
use crate::registry::core_kernel_registry;

/// CPU backend lowering nodes onto reference kernels.
///
/// Support is decided by the kernel registry alone: an operator is
/// supported if and only if some kernel is registered for it.
pub struct RefBackend {
    name: String,
    registry: KernelRegistry,
}

impl RefBackend {
    /// Backend over [`core_kernel_registry`].
    pub fn new() -> Self {
        Self::with_registry(core_kernel_registry())
    }

    pub fn with_registry(registry: KernelRegistry) -> Self {
        Self {
            name: "ref".to_string(),
            registry,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }
}

impl Default for RefBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for RefBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kernel_symbol(&self, op: &OpId) -> Option<&str> {
        self.registry.symbol(op)
    }

    fn lower(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>> {
        let kernel = self.registry.get(ctx.symbol).ok_or_else(|| {
            Error::Unsupported(format!(
                "{} backend has no kernel {} for {}",
                self.name,
                ctx.symbol,
                ctx.op()
            ))
        })?;
        tracing::trace!(node = %ctx.node.name, symbol = ctx.symbol, "lowering");
        kernel.create_dispatch(ctx)
    }
}
