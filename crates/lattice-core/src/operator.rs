//! Operator identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the callable a graph node invokes.
///
/// A traced program can reach the same computation through a module class
/// (`nn.Linear`), a free function (`F.linear`, `operator.add`) or a
/// method-style call on a tensor (`x.relu()`). The three shapes are kept
/// distinct so that pattern tables can configure them independently, and
/// equality/hashing is purely structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum OpId {
    /// A module class, e.g. `nn.Conv2d` or `nn.intrinsic.LinearReLU`.
    Module(String),

    /// A free function with its qualified path, e.g. `torch.add` or `operator.sub`.
    Function(String),

    /// A method name called on a tensor, e.g. `relu` or `view`.
    Method(String),
}

impl OpId {
    pub fn module(name: impl Into<String>) -> Self {
        OpId::Module(name.into())
    }

    pub fn function(name: impl Into<String>) -> Self {
        OpId::Function(name.into())
    }

    pub fn method(name: impl Into<String>) -> Self {
        OpId::Method(name.into())
    }

    /// The bare name without the variant tag.
    pub fn name(&self) -> &str {
        match self {
            OpId::Module(name) | OpId::Function(name) | OpId::Method(name) => name,
        }
    }

    /// Human-readable qualified name.
    ///
    /// Methods are rendered with a leading dot so `.relu` can never be
    /// confused with a function called `relu`.
    pub fn qualified_name(&self) -> String {
        match self {
            OpId::Module(name) | OpId::Function(name) => name.clone(),
            OpId::Method(name) => format!(".{name}"),
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, OpId::Module(_))
    }

    pub fn is_method(&self) -> bool {
        matches!(self, OpId::Method(_))
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
