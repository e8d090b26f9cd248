//! Pattern table for the native (fbgemm/qnnpack) quantized backend.
//!
//! Each operator family has its own generator; [`native_config_resolver`]
//! registers them in the order the table is expected to read, with the
//! catch-all share-qparams family last.

use crate::Result;
use crate::config::BackendPatternConfig;
use crate::dtype_config::DTypeConfig;
use crate::fuser::FuserMethod;
use crate::observation::ObservationType::{
    OutputShareObserverWithInput, OutputUseDifferentObserverAsInput,
};
use crate::observer::ObserverSpec;
use crate::pattern::Pattern;
use crate::resolver::{ConfigResolver, PatternEntry};
use crate::table::PatternTable;
use lattice_core::OpId;
use std::collections::BTreeMap;

fn module(name: &str) -> OpId {
    OpId::module(name)
}

fn function(name: &str) -> OpId {
    OpId::function(name)
}

fn method(name: &str) -> OpId {
    OpId::method(name)
}

/// Ops observed independently of their input, quantized to quint8.
pub fn default_op_int8_configs() -> Vec<PatternEntry> {
    let ops = [
        module("nn.ConvTranspose1d"),
        module("nn.ConvTranspose2d"),
        module("nn.ELU"),
        module("nn.LeakyReLU"),
        module("nn.Hardswish"),
        module("nn.InstanceNorm1d"),
        module("nn.InstanceNorm2d"),
        module("nn.InstanceNorm3d"),
        module("nn.LayerNorm"),
        module("nn.Dropout"),
        function("nn.functional.elu"),
        function("nn.functional.hardswish"),
        function("nn.functional.instance_norm"),
        function("nn.functional.leaky_relu"),
        function("nn.functional.dropout"),
        function("nn.functional.layer_norm"),
    ];
    ops.into_iter()
        .map(|op| {
            (
                Pattern::op(op),
                BackendPatternConfig::new(OutputUseDifferentObserverAsInput)
                    .with_dtype_configs(vec![DTypeConfig::default_op_quint8()]),
            )
        })
        .collect()
}

fn weighted() -> BackendPatternConfig {
    BackendPatternConfig::new(OutputUseDifferentObserverAsInput)
        .with_dtype_configs(vec![DTypeConfig::weighted_op_int8()])
}

/// Linear modules and functions, alone and fused with relu or batchnorm.
pub fn linear_configs() -> Vec<PatternEntry> {
    let linear = module("nn.Linear");
    let reference = module("nn.quantized._reference.Linear");
    let rooted = || {
        weighted()
            .with_root_module(linear.clone())
            .with_reference_quantized_module(reference.clone())
    };
    let fuse_linear_relu = || FuserMethod::sequential(module("nn.intrinsic.LinearReLU"));

    vec![
        // Single linear modules and functions.
        (
            Pattern::op(linear.clone()),
            rooted().with_qat_module(module("nn.qat.Linear")),
        ),
        (Pattern::op(module("nn.qat.Linear")), rooted()),
        (Pattern::op(function("nn.functional.linear")), weighted()),
        // Linear + relu.
        (
            Pattern::op(module("nn.intrinsic.LinearReLU")),
            rooted().with_qat_module(module("nn.intrinsic.qat.LinearReLU")),
        ),
        (Pattern::op(module("nn.intrinsic.qat.LinearReLU")), rooted()),
        (
            Pattern::sequence(linear.clone(), module("nn.ReLU")),
            weighted().with_fuser_method(fuse_linear_relu()),
        ),
        (
            Pattern::sequence(linear.clone(), function("nn.functional.relu")),
            weighted().with_fuser_method(fuse_linear_relu()),
        ),
        (
            Pattern::sequence(function("nn.functional.linear"), module("nn.ReLU")),
            weighted(),
        ),
        (
            Pattern::sequence(
                function("nn.functional.linear"),
                function("nn.functional.relu"),
            ),
            weighted(),
        ),
        // Linear + batchnorm.
        (
            Pattern::op(module("nn.intrinsic.LinearBn1d")),
            rooted().with_qat_module(module("nn.intrinsic.qat.LinearBn1d")),
        ),
        (Pattern::op(module("nn.intrinsic.qat.LinearBn1d")), rooted()),
    ]
}

/// Names of the conv family members for one dimensionality.
struct ConvFamily {
    root: OpId,
    reference: OpId,
    qat: OpId,
    relu: OpId,
    relu_qat: OpId,
    bn_qat: OpId,
    bn_relu_qat: OpId,
    func: OpId,
}

impl ConvFamily {
    fn new(dim: usize) -> Self {
        Self {
            root: module(&format!("nn.Conv{dim}d")),
            reference: module(&format!("nn.quantized._reference.Conv{dim}d")),
            qat: module(&format!("nn.qat.Conv{dim}d")),
            relu: module(&format!("nn.intrinsic.ConvReLU{dim}d")),
            relu_qat: module(&format!("nn.intrinsic.qat.ConvReLU{dim}d")),
            bn_qat: module(&format!("nn.intrinsic.qat.ConvBn{dim}d")),
            bn_relu_qat: module(&format!("nn.intrinsic.qat.ConvBnReLU{dim}d")),
            func: function(&format!("nn.functional.conv{dim}d")),
        }
    }
}

/// Conv1d/2d/3d modules and functions, alone and fused with relu or batchnorm.
pub fn conv_configs() -> Vec<PatternEntry> {
    let mut configs = Vec::new();
    for conv in [1, 2, 3].map(ConvFamily::new) {
        let rooted = || {
            weighted()
                .with_root_module(conv.root.clone())
                .with_reference_quantized_module(conv.reference.clone())
        };
        let fuse_conv_relu = || FuserMethod::sequential(conv.relu.clone());

        configs.extend([
            (
                Pattern::op(conv.root.clone()),
                rooted().with_qat_module(conv.qat.clone()),
            ),
            (Pattern::op(conv.qat.clone()), rooted()),
            (Pattern::op(conv.func.clone()), weighted()),
            (
                Pattern::op(conv.relu.clone()),
                rooted().with_qat_module(conv.relu_qat.clone()),
            ),
            (Pattern::op(conv.relu_qat.clone()), rooted()),
            (
                Pattern::sequence(conv.root.clone(), module("nn.ReLU")),
                weighted().with_fuser_method(fuse_conv_relu()),
            ),
            (
                Pattern::sequence(conv.root.clone(), function("nn.functional.relu")),
                weighted().with_fuser_method(fuse_conv_relu()),
            ),
            (
                Pattern::sequence(conv.func.clone(), module("nn.ReLU")),
                weighted(),
            ),
            (
                Pattern::sequence(conv.func.clone(), function("nn.functional.relu")),
                weighted(),
            ),
            (Pattern::op(conv.bn_qat.clone()), rooted()),
            (Pattern::op(conv.bn_relu_qat.clone()), rooted()),
        ]);
    }
    configs
}

/// Binary ops with quantized scalar variants, alone and followed by relu.
///
/// Observation depends on how many tensor arguments the call has: with a
/// single tensor (`x + 1.0`) the output shares the input observer.
pub fn binary_op_configs() -> Vec<PatternEntry> {
    let mapping = BTreeMap::from([
        (0, OutputUseDifferentObserverAsInput),
        (1, OutputShareObserverWithInput),
        (2, OutputUseDifferentObserverAsInput),
    ]);
    let config = || {
        BackendPatternConfig::by_tensor_arg_count(mapping.clone())
            .with_dtype_configs(vec![DTypeConfig::weighted_op_int8()])
    };

    let mut configs = Vec::new();
    for op in [
        function("operator.add"),
        function("torch.add"),
        function("operator.mul"),
        function("torch.mul"),
    ] {
        for relu in [
            module("nn.ReLU"),
            function("nn.functional.relu"),
            function("torch.relu"),
        ] {
            configs.push((Pattern::sequence(op.clone(), relu), config()));
        }
        configs.push((Pattern::op(op), config()));
    }
    configs
}

/// Ops with a known output range, observed with fixed quantization parameters.
pub fn fixed_qparams_op_configs() -> Vec<PatternEntry> {
    let affine = ObserverSpec::default_affine_fixed_qparams;
    let symmetric = ObserverSpec::default_symmetric_fixed_qparams;
    let ops = [
        (module("nn.Hardsigmoid"), affine()),
        (function("nn.functional.hardsigmoid"), affine()),
        (method("hardsigmoid"), affine()),
        (method("hardsigmoid_"), affine()),
        (module("nn.Sigmoid"), affine()),
        (function("torch.sigmoid"), affine()),
        (method("sigmoid"), affine()),
        (method("sigmoid_"), affine()),
        (module("nn.Tanh"), symmetric()),
        (function("torch.tanh"), symmetric()),
        (method("tanh"), symmetric()),
        (method("tanh_"), symmetric()),
    ];
    ops.into_iter()
        .map(|(op, observer)| {
            (
                Pattern::op(op),
                BackendPatternConfig::new(OutputUseDifferentObserverAsInput)
                    .with_fixed_qparams(observer)
                    .with_dtype_configs(vec![DTypeConfig::weighted_op_int8()]),
            )
        })
        .collect()
}

pub fn cat_config() -> Vec<PatternEntry> {
    vec![(
        Pattern::op(function("torch.cat")),
        BackendPatternConfig::new(OutputShareObserverWithInput)
            .with_dtype_configs(vec![DTypeConfig::default_op_quint8()]),
    )]
}

/// Batchnorm 2d/3d and their relu-fused modules.
pub fn bn_configs() -> Vec<PatternEntry> {
    [
        module("nn.BatchNorm2d"),
        module("nn.BatchNorm3d"),
        module("nn.intrinsic.BNReLU2d"),
        module("nn.intrinsic.BNReLU3d"),
    ]
    .into_iter()
    .map(|op| {
        (
            Pattern::op(op),
            BackendPatternConfig::new(OutputUseDifferentObserverAsInput)
                .with_dtype_configs(vec![DTypeConfig::default_op_quint8()]),
        )
    })
    .collect()
}

/// Ops that work on float and quantized input alike; a quantized output
/// reuses the input's quantization parameters.
pub fn share_qparams_op_configs() -> Vec<PatternEntry> {
    let modules = [
        "nn.AdaptiveAvgPool1d",
        "nn.AdaptiveAvgPool2d",
        "nn.AdaptiveAvgPool3d",
        "nn.AvgPool1d",
        "nn.AvgPool2d",
        "nn.AvgPool3d",
        "nn.Hardtanh",
        "nn.Identity",
        "nn.MaxPool1d",
        "nn.MaxPool2d",
        "nn.MaxPool3d",
        "nn.ReLU",
        "nn.ReLU6",
    ];
    let functions = [
        "torch.adaptive_avg_pool1d",
        "nn.functional.adaptive_avg_pool2d",
        "nn.functional.adaptive_avg_pool3d",
        "nn.functional.hardtanh",
        "nn.functional.hardtanh_",
        "nn.functional.interpolate",
        "nn.functional.max_pool1d",
        "nn.functional.max_pool2d",
        "nn.functional.max_pool3d",
        "nn.functional.relu",
        "nn.functional.relu6",
        "torch.avg_pool1d",
        "torch._C._nn.avg_pool2d",
        "torch._C._nn.avg_pool3d",
        "torch.clamp",
        "torch.flatten",
        "torch.mean",
        "torch.repeat_interleave",
        "torch.transpose",
        "torch.squeeze",
        "torch.stack",
        "torch.unsqueeze",
        "operator.floordiv",
    ];
    let methods = [
        "contiguous",
        "clamp",
        "detach",
        "detach_",
        "mean",
        "permute",
        "repeat",
        "repeat_interleave",
        "reshape",
        "resize_",
        "relu",
        "relu_",
        "shape",
        "size",
        "squeeze",
        "squeeze_",
        "transpose",
        "unsqueeze",
        "unsqueeze_",
        "view",
    ];

    modules
        .into_iter()
        .map(module)
        .chain(functions.into_iter().map(function))
        .chain(methods.into_iter().map(method))
        .map(|op| {
            (
                Pattern::op(op),
                BackendPatternConfig::new(OutputShareObserverWithInput)
                    .with_dtype_configs(vec![DTypeConfig::default_op_quint8()]),
            )
        })
        .collect()
}

/// Resolver with every native generator registered.
pub fn native_config_resolver() -> ConfigResolver {
    ConfigResolver::new("native")
        .with_generator("default_op_int8", default_op_int8_configs)
        .with_generator("linear", linear_configs)
        .with_generator("conv", conv_configs)
        .with_generator("binary_op", binary_op_configs)
        .with_generator("fixed_qparams_op", fixed_qparams_op_configs)
        .with_generator("cat", cat_config)
        .with_generator("bn", bn_configs)
        .with_generator("share_qparams_op", share_qparams_op_configs)
}

/// The resolved native backend table.
pub fn native_backend_config() -> Result<PatternTable> {
    native_config_resolver().resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationType;

    #[test]
    fn test_native_table_resolves() {
        let table = native_backend_config().unwrap();
        assert_eq!(table.name(), "native");

        let expected = default_op_int8_configs().len()
            + linear_configs().len()
            + conv_configs().len()
            + binary_op_configs().len()
            + fixed_qparams_op_configs().len()
            + cat_config().len()
            + bn_configs().len()
            + share_qparams_op_configs().len();
        assert_eq!(table.len(), expected);
    }

    #[test]
    fn test_family_sizes() {
        assert_eq!(default_op_int8_configs().len(), 16);
        assert_eq!(linear_configs().len(), 11);
        assert_eq!(conv_configs().len(), 33);
        assert_eq!(binary_op_configs().len(), 16);
        assert_eq!(fixed_qparams_op_configs().len(), 12);
        assert_eq!(bn_configs().len(), 4);
        assert_eq!(share_qparams_op_configs().len(), 56);
    }

    #[test]
    fn test_linear_metadata() {
        let table = native_backend_config().unwrap();
        let linear = table.get(&Pattern::op(module("nn.Linear"))).unwrap();
        assert_eq!(linear.root_module, Some(module("nn.Linear")));
        assert_eq!(
            linear.reference_quantized_module,
            Some(module("nn.quantized._reference.Linear"))
        );
        assert_eq!(linear.qat_module, Some(module("nn.qat.Linear")));
        assert_eq!(linear.dtype_configs, vec![DTypeConfig::weighted_op_int8()]);

        let qat = table.get(&Pattern::op(module("nn.qat.Linear"))).unwrap();
        assert!(qat.qat_module.is_none());

        let chain = table
            .get(&Pattern::sequence(module("nn.Linear"), module("nn.ReLU")))
            .unwrap();
        assert_eq!(
            chain.fuser_method,
            Some(FuserMethod::sequential(module("nn.intrinsic.LinearReLU")))
        );

        let functional = table
            .get(&Pattern::sequence(
                function("nn.functional.linear"),
                module("nn.ReLU"),
            ))
            .unwrap();
        assert!(functional.fuser_method.is_none());
    }

    #[test]
    fn test_conv_families_fuse_to_matching_dim() {
        let table = native_backend_config().unwrap();
        for dim in 1..=3 {
            let chain = Pattern::sequence(
                module(&format!("nn.Conv{dim}d")),
                function("nn.functional.relu"),
            );
            let config = table.get(&chain).unwrap();
            assert_eq!(
                config.fuser_method.as_ref().map(FuserMethod::fused_op),
                Some(&module(&format!("nn.intrinsic.ConvReLU{dim}d")))
            );
        }
    }

    #[test]
    fn test_binary_op_observation_by_arity() {
        let table = native_backend_config().unwrap();
        let add = table.get(&Pattern::op(function("operator.add"))).unwrap();
        assert_eq!(
            add.observation.resolve(1),
            Some(ObservationType::OutputShareObserverWithInput)
        );
        assert_eq!(
            add.observation.resolve(2),
            Some(ObservationType::OutputUseDifferentObserverAsInput)
        );
        assert_eq!(
            add.observation.resolve(0),
            Some(ObservationType::OutputUseDifferentObserverAsInput)
        );
    }

    #[test]
    fn test_fixed_qparams_overrides() {
        let table = native_backend_config().unwrap();
        let tanh = table.get(&Pattern::op(method("tanh_"))).unwrap();
        assert_eq!(
            tanh.output_observer,
            Some(ObserverSpec::default_symmetric_fixed_qparams())
        );
        let sigmoid = table.get(&Pattern::op(function("torch.sigmoid"))).unwrap();
        assert_eq!(
            sigmoid.output_observer,
            Some(ObserverSpec::default_affine_fixed_qparams())
        );
        assert!(sigmoid.output_fake_quantizer.is_some());
    }

    #[test]
    fn test_share_qparams_and_bn() {
        let table = native_backend_config().unwrap();
        let view = table.get(&Pattern::op(method("view"))).unwrap();
        assert_eq!(
            view.observation.resolve(1),
            Some(ObservationType::OutputShareObserverWithInput)
        );

        let cat = table.get(&Pattern::op(function("torch.cat"))).unwrap();
        assert_eq!(cat.dtype_configs, vec![DTypeConfig::default_op_quint8()]);

        let bn = table.get(&Pattern::op(module("nn.BatchNorm2d"))).unwrap();
        assert_eq!(bn.dtype_configs, vec![DTypeConfig::default_op_quint8()]);
        assert_eq!(
            bn.observation.resolve(1),
            Some(ObservationType::OutputUseDifferentObserverAsInput)
        );
    }
}
