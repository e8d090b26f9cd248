//! Per-pattern backend configuration.

use crate::dtype_config::DTypeConfig;
use crate::fuser::FuserMethod;
use crate::observation::{ObservationStrategy, ObservationType};
use crate::observer::{FakeQuantizeSpec, ObserverSpec};
use lattice_core::OpId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Quantization metadata attached to one pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendPatternConfig {
    pub observation: ObservationStrategy,

    /// Supported dtype combinations, tried in order.
    pub dtype_configs: Vec<DTypeConfig>,

    /// Float module at the root of the pattern, e.g. `nn.Linear` for a
    /// fused `nn.intrinsic.LinearReLU`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_module: Option<OpId>,

    /// Reference quantized counterpart of `root_module`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_quantized_module: Option<OpId>,

    /// Module swapped in for quantization-aware training.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qat_module: Option<OpId>,

    /// How a matched chain collapses into one node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuser_method: Option<FuserMethod>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_observer: Option<ObserverSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_fake_quantizer: Option<FakeQuantizeSpec>,
}

impl BackendPatternConfig {
    pub fn new(observation: impl Into<ObservationStrategy>) -> Self {
        Self {
            observation: observation.into(),
            dtype_configs: Vec::new(),
            root_module: None,
            reference_quantized_module: None,
            qat_module: None,
            fuser_method: None,
            output_observer: None,
            output_fake_quantizer: None,
        }
    }

    /// Observation type chosen by the number of tensor arguments.
    pub fn by_tensor_arg_count(mapping: BTreeMap<usize, ObservationType>) -> Self {
        Self::new(ObservationStrategy::ByTensorArgCount(mapping))
    }

    pub fn with_dtype_configs(mut self, dtype_configs: Vec<DTypeConfig>) -> Self {
        self.dtype_configs = dtype_configs;
        self
    }

    pub fn with_root_module(mut self, root: OpId) -> Self {
        self.root_module = Some(root);
        self
    }

    pub fn with_reference_quantized_module(mut self, reference: OpId) -> Self {
        self.reference_quantized_module = Some(reference);
        self
    }

    pub fn with_qat_module(mut self, qat: OpId) -> Self {
        self.qat_module = Some(qat);
        self
    }

    pub fn with_fuser_method(mut self, fuser: FuserMethod) -> Self {
        self.fuser_method = Some(fuser);
        self
    }

    /// Override the output observer and the matching fake-quantizer.
    pub fn with_fixed_qparams(mut self, observer: ObserverSpec) -> Self {
        self.output_fake_quantizer = Some(FakeQuantizeSpec::fixed_qparams(observer.clone()));
        self.output_observer = Some(observer);
        self
    }
}
