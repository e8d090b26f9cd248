//! Core kernel registry.
//!
//! Provides a pre-populated registry with the reference kernels.

use lattice_core::OpId;

use crate::families::{BinaryElementwiseKernel, UnaryElementwiseKernel};
use crate::kernel::KernelRegistry;
use crate::operators::{AddcmulKernel, ChunkKernel};

/// Returns a kernel registry pre-populated with the reference kernels.
///
/// Each kernel is reachable from its functional (`operator.*`, `torch.*`),
/// method and, for activations, module spellings. Custom kernels can be
/// added via `registry.register(ops, kernel)`.
pub fn core_kernel_registry() -> KernelRegistry {
    let mut registry = KernelRegistry::new();

    // Binary elementwise kernels
    registry.register(
        [
            OpId::function("operator.add"),
            OpId::function("torch.add"),
            OpId::method("add"),
        ],
        BinaryElementwiseKernel::add(),
    );
    registry.register(
        [
            OpId::function("operator.sub"),
            OpId::function("torch.sub"),
            OpId::method("sub"),
        ],
        BinaryElementwiseKernel::sub(),
    );
    registry.register(
        [
            OpId::function("operator.mul"),
            OpId::function("torch.mul"),
            OpId::method("mul"),
        ],
        BinaryElementwiseKernel::mul(),
    );
    registry.register(
        [
            OpId::function("operator.truediv"),
            OpId::function("torch.div"),
            OpId::method("div"),
        ],
        BinaryElementwiseKernel::div(),
    );

    // Unary elementwise kernels
    registry.register(
        [
            OpId::function("operator.neg"),
            OpId::function("torch.neg"),
            OpId::method("neg"),
        ],
        UnaryElementwiseKernel::neg(),
    );
    registry.register(
        [
            OpId::function("torch.relu"),
            OpId::function("nn.functional.relu"),
            OpId::method("relu"),
            OpId::module("nn.ReLU"),
        ],
        UnaryElementwiseKernel::relu(),
    );
    registry.register(
        [
            OpId::function("torch.sigmoid"),
            OpId::method("sigmoid"),
            OpId::module("nn.Sigmoid"),
        ],
        UnaryElementwiseKernel::sigmoid(),
    );
    registry.register(
        [
            OpId::function("torch.tanh"),
            OpId::method("tanh"),
            OpId::module("nn.Tanh"),
        ],
        UnaryElementwiseKernel::tanh(),
    );

    // Other kernels
    registry.register(
        [OpId::function("torch.addcmul"), OpId::method("addcmul")],
        AddcmulKernel,
    );
    registry.register(
        [OpId::function("torch.chunk"), OpId::method("chunk")],
        ChunkKernel,
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_registry_contents() {
        let registry = core_kernel_registry();
        assert_eq!(registry.len(), 10);
        assert_eq!(
            registry.symbol(&OpId::function("operator.sub")),
            Some("aten::sub")
        );
        assert_eq!(registry.symbol(&OpId::module("nn.ReLU")), Some("aten::relu"));
        assert_eq!(
            registry.symbol(&OpId::function("torch.addcmul")),
            Some("aten::addcmul")
        );
        assert!(registry.symbol(&OpId::module("nn.Linear")).is_none());
    }
}
