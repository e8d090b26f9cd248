//! Opaque observer and fake-quantize specifications.
//!
//! Lattice does not compute observer statistics. These records only
//! describe which observer a pattern overrides its output with, so that a
//! quantization flow can build the real thing.

use lattice_core::DataType;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObserverSpec {
    /// An observer that always reports the same quantization parameters.
    FixedQParams {
        scale: f64,
        zero_point: i64,
        dtype: DataType,
        quant_min: i64,
        quant_max: i64,
    },
}

impl ObserverSpec {
    /// Fixed parameters for outputs in `[0, 1]` (sigmoid, hardsigmoid).
    pub fn default_affine_fixed_qparams() -> Self {
        ObserverSpec::FixedQParams {
            scale: 1.0 / 256.0,
            zero_point: 0,
            dtype: DataType::QUInt8,
            quant_min: 0,
            quant_max: 255,
        }
    }

    /// Fixed parameters for outputs in `[-1, 1]` (tanh).
    pub fn default_symmetric_fixed_qparams() -> Self {
        ObserverSpec::FixedQParams {
            scale: 2.0 / 256.0,
            zero_point: 128,
            dtype: DataType::QUInt8,
            quant_min: 0,
            quant_max: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FakeQuantizeSpec {
    /// Fake-quantize with parameters taken from a fixed-qparams observer.
    FixedQParams { observer: ObserverSpec },
}

impl FakeQuantizeSpec {
    pub fn fixed_qparams(observer: ObserverSpec) -> Self {
        FakeQuantizeSpec::FixedQParams { observer }
    }

    pub fn observer(&self) -> &ObserverSpec {
        match self {
            FakeQuantizeSpec::FixedQParams { observer } => observer,
        }
    }
}
