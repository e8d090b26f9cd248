//! Pattern table assembly from generator functions.

use crate::Result;
use crate::config::BackendPatternConfig;
use crate::pattern::Pattern;
use crate::table::PatternTable;

/// One generated `(pattern, config)` pair.
pub type PatternEntry = (Pattern, BackendPatternConfig);

type Generator = Box<dyn Fn() -> Vec<PatternEntry> + Send + Sync>;

/// Builds a [`PatternTable`] from an ordered list of generators.
///
/// Each generator yields the entries of one operator family. Generators
/// run in registration order on every `resolve()`, so resolving twice
/// gives equal tables.
pub struct ConfigResolver {
    name: String,
    generators: Vec<(String, Generator)>,
}

impl ConfigResolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generators: Vec::new(),
        }
    }

    /// Register a generator. Later generators may not redefine patterns
    /// produced by earlier ones.
    pub fn with_generator<G>(mut self, name: impl Into<String>, generator: G) -> Self
    where
        G: Fn() -> Vec<PatternEntry> + Send + Sync + 'static,
    {
        self.generators.push((name.into(), Box::new(generator)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generator names in run order.
    pub fn generator_names(&self) -> impl Iterator<Item = &str> {
        self.generators.iter().map(|(name, _)| name.as_str())
    }

    /// Run all generators and build the table.
    ///
    /// Fails with [`QuantError::DuplicatePattern`](crate::QuantError::DuplicatePattern)
    /// on the first pattern registered twice.
    #[tracing::instrument(skip_all, fields(table = %self.name))]
    pub fn resolve(&self) -> Result<PatternTable> {
        let mut table = PatternTable::new(self.name.clone());
        for (generator, generate) in &self.generators {
            let entries = generate();
            tracing::debug!(generator = %generator, count = entries.len(), "resolving");
            for (pattern, config) in entries {
                table.insert(pattern, config, generator)?;
            }
        }
        tracing::debug!(entries = table.len(), "pattern table resolved");
        Ok(table)
    }
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("name", &self.name)
            .field("generators", &self.generator_names().collect::<Vec<_>>())
            .finish()
    }
}
