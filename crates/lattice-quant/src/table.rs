//! Resolved pattern table.

use crate::config::BackendPatternConfig;
use crate::pattern::Pattern;
use crate::{QuantError, Result};
use lattice_core::OpId;
use std::collections::HashMap;

/// One resolved entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub pattern: Pattern,
    pub config: BackendPatternConfig,

    /// Name of the generator that registered the entry.
    pub generator: String,
}

/// Immutable mapping from [`Pattern`] to [`BackendPatternConfig`].
///
/// Entries keep insertion order. Single-op patterns are indexed by their
/// `OpId` and chain patterns by their terminal op, so matching a node only
/// looks at candidates anchored on that node's operator.
///
/// # Example
///
/// ```ignore
/// let table = ConfigResolver::new("native")
///     .with_generator("linear", linear_configs)
///     .resolve()?;
///
/// let config = table.get(&Pattern::op(OpId::module("nn.Linear"))).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTable {
    name: String,
    entries: Vec<TableEntry>,
    index: HashMap<Pattern, usize>,
    singles: HashMap<OpId, usize>,
    /// Chain entries by terminal op, longest first, then registration order.
    chains_by_terminal: HashMap<OpId, Vec<usize>>,
}

impl PatternTable {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            index: HashMap::new(),
            singles: HashMap::new(),
            chains_by_terminal: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        pattern: Pattern,
        config: BackendPatternConfig,
        generator: &str,
    ) -> Result<()> {
        pattern.validate()?;
        if let Some(&existing) = self.index.get(&pattern) {
            return Err(QuantError::DuplicatePattern {
                pattern,
                generator: generator.to_string(),
                existing: self.entries[existing].generator.clone(),
            });
        }

        let position = self.entries.len();
        match &pattern {
            Pattern::Op(op) => {
                self.singles.insert(op.clone(), position);
            }
            Pattern::Chain(ops) => {
                if let Some(terminal) = ops.last() {
                    let candidates = self.chains_by_terminal.entry(terminal.clone()).or_default();
                    // Stable: equal lengths keep registration order.
                    let at = candidates
                        .iter()
                        .position(|&i| self.entries[i].pattern.len() < ops.len())
                        .unwrap_or(candidates.len());
                    candidates.insert(at, position);
                }
            }
        }
        self.index.insert(pattern.clone(), position);
        self.entries.push(TableEntry {
            pattern,
            config,
            generator: generator.to_string(),
        });
        Ok(())
    }

    /// Table name, e.g. `native`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, pattern: &Pattern) -> bool {
        self.index.contains_key(pattern)
    }

    /// Look up the configuration registered for exactly `pattern`.
    pub fn get(&self, pattern: &Pattern) -> Option<&BackendPatternConfig> {
        self.index.get(pattern).map(|&i| &self.entries[i].config)
    }

    /// Entry at a registration position.
    pub fn entry(&self, position: usize) -> Option<&TableEntry> {
        self.entries.get(position)
    }

    /// Iterate over `(pattern, config)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Pattern, &BackendPatternConfig)> {
        self.entries.iter().map(|e| (&e.pattern, &e.config))
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Position of the single-op entry for `op`.
    pub fn single(&self, op: &OpId) -> Option<usize> {
        self.singles.get(op).copied()
    }

    /// Positions of chain entries ending in `op`, in match precedence order.
    pub fn chains_ending_with(&self, op: &OpId) -> &[usize] {
        self.chains_by_terminal
            .get(op)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationType;

    fn config() -> BackendPatternConfig {
        BackendPatternConfig::new(ObservationType::OutputUseDifferentObserverAsInput)
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = PatternTable::new("test");
        let linear = Pattern::op(OpId::module("nn.Linear"));
        table.insert(linear.clone(), config(), "linear").unwrap();

        assert_eq!(table.name(), "test");
        assert_eq!(table.len(), 1);
        assert!(table.contains(&linear));
        assert!(table.get(&linear).is_some());
        assert!(table.get(&Pattern::op(OpId::function("nn.functional.linear"))).is_none());
        assert_eq!(table.single(&OpId::module("nn.Linear")), Some(0));
    }

    #[test]
    fn test_duplicate_names_both_generators() {
        let mut table = PatternTable::new("test");
        let relu = Pattern::op(OpId::method("relu"));
        table.insert(relu.clone(), config(), "first").unwrap();

        let err = table.insert(relu, config(), "second").unwrap_err();
        match err {
            QuantError::DuplicatePattern {
                generator,
                existing,
                ..
            } => {
                assert_eq!(generator, "second");
                assert_eq!(existing, "first");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_chains_sorted_longest_first() {
        let mut table = PatternTable::new("test");
        let relu = OpId::module("nn.ReLU");
        let short = Pattern::sequence(OpId::module("nn.BatchNorm2d"), relu.clone());
        let long = Pattern::chain(vec![
            OpId::module("nn.Conv2d"),
            OpId::module("nn.BatchNorm2d"),
            relu.clone(),
        ])
        .unwrap();
        let other_short = Pattern::sequence(OpId::module("nn.Linear"), relu.clone());

        table.insert(short, config(), "bn").unwrap();
        table.insert(long, config(), "conv").unwrap();
        table.insert(other_short, config(), "linear").unwrap();

        assert_eq!(table.chains_ending_with(&relu), &[1, 0, 2]);
        assert!(table.chains_ending_with(&OpId::module("nn.Linear")).is_empty());
    }

    #[test]
    fn test_insert_rejects_short_chain() {
        let mut table = PatternTable::new("test");
        let bad = Pattern::Chain(vec![OpId::module("nn.ReLU")]);
        assert!(table.insert(bad, config(), "bad").is_err());
        assert!(table.is_empty());
    }
}
