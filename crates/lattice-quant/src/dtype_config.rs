//! Supported dtype combinations.

use lattice_core::DataType;
use serde::Serialize;

/// One dtype combination a backend supports for a pattern.
///
/// Each field is an optional constraint; `None` means the pattern places
/// no requirement on that tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DTypeConfig {
    pub input: Option<DataType>,
    pub weight: Option<DataType>,
    pub bias: Option<DataType>,
    pub output: Option<DataType>,
}

impl DTypeConfig {
    /// Ops with quantized weights, like linear and conv.
    pub const fn weighted_op_int8() -> Self {
        Self {
            input: Some(DataType::QUInt8),
            weight: Some(DataType::QInt8),
            bias: Some(DataType::F32),
            output: Some(DataType::QUInt8),
        }
    }

    /// Activation-only ops quantized to quint8.
    pub const fn default_op_quint8() -> Self {
        Self {
            input: Some(DataType::QUInt8),
            weight: None,
            bias: None,
            output: Some(DataType::QUInt8),
        }
    }

    /// Half-precision ops.
    pub const fn default_op_fp16() -> Self {
        Self {
            input: Some(DataType::F16),
            weight: Some(DataType::F16),
            bias: None,
            output: Some(DataType::F16),
        }
    }

    /// Whether a requested combination satisfies every constraint set here.
    pub fn accepts(&self, requested: &DTypeConfig) -> bool {
        fn ok(constraint: Option<DataType>, requested: Option<DataType>) -> bool {
            constraint.is_none() || constraint == requested
        }
        ok(self.input, requested.input)
            && ok(self.weight, requested.weight)
            && ok(self.bias, requested.bias)
            && ok(self.output, requested.output)
    }
}
