//! Kernel trait and registry.

use lattice_core::{LowerCtx, OpDispatch, OpId, Result};
use std::collections::HashMap;

/// A reference kernel that can be lowered into a dispatch.
///
/// # Example
///
/// ```ignore
/// struct NegKernel;
///
/// impl Kernel for NegKernel {
///     fn symbol(&self) -> &str {
///         "aten::neg"
///     }
///
///     fn create_dispatch(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>> {
///         ctx.expect_operands(1)?;
///         Ok(Box::new(NegDispatch))
///     }
/// }
/// ```
pub trait Kernel: Send + Sync {
    /// Backend-qualified kernel name, e.g. `aten::sub`.
    fn symbol(&self) -> &str;

    /// Create the dispatch object for one node.
    ///
    /// Overload selection (tensor vs scalar operands) happens here, so the
    /// dispatch does no per-call inspection of argument kinds.
    fn create_dispatch(&self, ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>>;
}

/// Maps traced operators to kernel symbols and symbols to kernels.
///
/// Several `OpId`s usually alias the same kernel: `operator.sub`,
/// `torch.sub` and `x.sub()` all lower to `aten::sub`.
///
/// ```ignore
/// let mut registry = KernelRegistry::new();
/// registry.register(
///     [OpId::function("operator.sub"), OpId::method("sub")],
///     BinaryElementwiseKernel::sub(),
/// );
/// assert_eq!(registry.symbol(&OpId::method("sub")), Some("aten::sub"));
/// ```
pub struct KernelRegistry {
    symbols: HashMap<OpId, String>,
    kernels: HashMap<String, Box<dyn Kernel>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            kernels: HashMap::new(),
        }
    }

    /// Register a kernel under its symbol, reachable from each of `ops`.
    ///
    /// Returns `self` for method chaining.
    pub fn register<K>(&mut self, ops: impl IntoIterator<Item = OpId>, kernel: K) -> &mut Self
    where
        K: Kernel + 'static,
    {
        let symbol = kernel.symbol().to_string();
        for op in ops {
            self.symbols.insert(op, symbol.clone());
        }
        self.kernels.insert(symbol, Box::new(kernel));
        self
    }

    /// Kernel symbol for a traced operator.
    pub fn symbol(&self, op: &OpId) -> Option<&str> {
        self.symbols.get(op).map(String::as_str)
    }

    /// Kernel registered under `symbol`.
    pub fn get(&self, symbol: &str) -> Option<&dyn Kernel> {
        self.kernels.get(symbol).map(|k| k.as_ref())
    }

    pub fn contains(&self, op: &OpId) -> bool {
        self.symbols.contains_key(op)
    }

    /// Number of distinct kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Registered kernel symbols, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.kernels.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    /// Operators with a kernel, sorted.
    pub fn ops(&self) -> Vec<&OpId> {
        let mut ops: Vec<&OpId> = self.symbols.keys().collect();
        ops.sort();
        ops
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::{DispatchInput, Error, Tensor};

    #[derive(Debug)]
    struct Nothing;

    impl OpDispatch for Nothing {
        fn dispatch(&self, _inputs: &[DispatchInput]) -> Result<Vec<Tensor>> {
            Err(Error::Kernel("mock kernel for testing".to_string()))
        }
    }

    struct MockKernel(&'static str);

    impl Kernel for MockKernel {
        fn symbol(&self) -> &str {
            self.0
        }

        fn create_dispatch(&self, _ctx: &LowerCtx<'_>) -> Result<Box<dyn OpDispatch>> {
            Ok(Box::new(Nothing))
        }
    }

    #[test]
    fn test_register_aliases() {
        let mut registry = KernelRegistry::new();
        registry
            .register(
                [OpId::function("operator.sub"), OpId::method("sub")],
                MockKernel("aten::sub"),
            )
            .register([OpId::function("torch.neg")], MockKernel("aten::neg"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.symbol(&OpId::method("sub")), Some("aten::sub"));
        assert_eq!(
            registry.symbol(&OpId::function("operator.sub")),
            Some("aten::sub")
        );
        assert!(registry.symbol(&OpId::function("sub")).is_none());
        assert!(registry.get("aten::neg").is_some());
        assert_eq!(registry.symbols(), vec!["aten::neg", "aten::sub"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = KernelRegistry::default();
        assert!(registry.is_empty());
        assert!(!registry.contains(&OpId::method("relu")));
    }
}
