//! Operator patterns.

use crate::{QuantError, Result};
use lattice_core::OpId;
use serde::Serialize;
use std::fmt;

/// What a table entry matches in a captured graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// A single operator.
    Op(OpId),

    /// A chain of operators in execution order: the first op produces the
    /// input of the second, and so on. The last op is the terminal.
    Chain(Vec<OpId>),
}

impl Pattern {
    pub fn op(op: OpId) -> Self {
        Pattern::Op(op)
    }

    /// Two-op chain: `first` feeds `then`.
    pub fn sequence(first: OpId, then: OpId) -> Self {
        Pattern::Chain(vec![first, then])
    }

    /// Chain of arbitrary length. Needs at least two ops.
    pub fn chain(ops: Vec<OpId>) -> Result<Self> {
        let pattern = Pattern::Chain(ops);
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Pattern::Chain(ops) if ops.len() < 2 => Err(QuantError::InvalidPattern(format!(
                "chain {self} must have at least two ops"
            ))),
            _ => Ok(()),
        }
    }

    /// The op whose node the pattern is anchored on.
    pub fn terminal(&self) -> Option<&OpId> {
        match self {
            Pattern::Op(op) => Some(op),
            Pattern::Chain(ops) => ops.last(),
        }
    }

    /// The op that receives the pattern's external inputs.
    pub fn root(&self) -> Option<&OpId> {
        match self {
            Pattern::Op(op) => Some(op),
            Pattern::Chain(ops) => ops.first(),
        }
    }

    /// Number of nodes the pattern spans.
    pub fn len(&self) -> usize {
        match self {
            Pattern::Op(_) => 1,
            Pattern::Chain(ops) => ops.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_chain(&self) -> bool {
        matches!(self, Pattern::Chain(_))
    }

    pub fn ops(&self) -> &[OpId] {
        match self {
            Pattern::Op(op) => std::slice::from_ref(op),
            Pattern::Chain(ops) => ops,
        }
    }
}

impl From<OpId> for Pattern {
    fn from(op: OpId) -> Self {
        Pattern::Op(op)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Op(op) => write!(f, "{op}"),
            Pattern::Chain(ops) => {
                let names: Vec<String> = ops.iter().map(OpId::qualified_name).collect();
                write!(f, "({})", names.join(" -> "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_requires_two_ops() {
        assert!(Pattern::chain(vec![OpId::module("nn.Linear")]).is_err());
        assert!(Pattern::chain(vec![OpId::module("nn.Linear"), OpId::module("nn.ReLU")]).is_ok());
    }

    #[test]
    fn test_root_and_terminal() {
        let pattern = Pattern::sequence(OpId::module("nn.Linear"), OpId::method("relu"));
        assert_eq!(pattern.root(), Some(&OpId::module("nn.Linear")));
        assert_eq!(pattern.terminal(), Some(&OpId::method("relu")));
        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern.to_string(), "(nn.Linear -> .relu)");
    }

    #[test]
    fn test_single_op_is_not_a_chain() {
        let single = Pattern::from(OpId::function("torch.cat"));
        let chain = Pattern::sequence(OpId::function("torch.cat"), OpId::module("nn.ReLU"));
        assert!(!single.is_chain());
        assert_ne!(single, chain);
        assert_eq!(single.ops(), &[OpId::function("torch.cat")]);
    }
}
