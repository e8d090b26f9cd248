//! Observer placement strategies.

use serde::Serialize;
use std::collections::BTreeMap;

/// How the output of a quantized op is observed relative to its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    /// The output gets its own observer, independent of the input's.
    ///
    /// Used for ops whose output range differs from the input range,
    /// e.g. conv, linear, add.
    OutputUseDifferentObserverAsInput,

    /// The output reuses the input's observer instance.
    ///
    /// Used for ops that preserve quantization parameters, e.g. max pool,
    /// reshape, transpose: `observer_0 - maxpool - observer_0`.
    OutputShareObserverWithInput,
}

/// The observation policy recorded on a pattern configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationStrategy {
    /// The same observation type regardless of how the op is called.
    Fixed(ObservationType),

    /// Variable-arity ops (binary ops with scalar overloads) pick the
    /// observation type from the number of tensor arguments.
    ByTensorArgCount(BTreeMap<usize, ObservationType>),
}

impl ObservationStrategy {
    /// Resolve the observation type for a call with `num_tensor_args`
    /// tensor arguments. `None` if the mapping has no entry.
    pub fn resolve(&self, num_tensor_args: usize) -> Option<ObservationType> {
        match self {
            ObservationStrategy::Fixed(ty) => Some(*ty),
            ObservationStrategy::ByTensorArgCount(mapping) => {
                mapping.get(&num_tensor_args).copied()
            }
        }
    }
}

impl From<ObservationType> for ObservationStrategy {
    fn from(ty: ObservationType) -> Self {
        ObservationStrategy::Fixed(ty)
    }
}
