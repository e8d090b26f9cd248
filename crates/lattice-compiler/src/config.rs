//! Lazy-mode configuration.
//!
//! The only knob is the force-fallback set: operators (by kernel symbol
//! such as `aten::sub`, or by traced name such as `operator.sub`) that the
//! extractor must treat as unsupported even when the backend has a kernel.

use lattice_core::OpId;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Environment variable read by [`LazyConfig::from_env`].
pub const FORCE_FALLBACK_ENV: &str = "LATTICE_FORCE_FALLBACK";

/// Configuration consulted during extraction.
///
/// Shared by reference; the force-fallback set is behind a lock so scoped
/// overrides can be installed through `&self`.
#[derive(Debug, Default)]
pub struct LazyConfig {
    force_fallback: RwLock<BTreeSet<String>>,
}

impl LazyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `LATTICE_FORCE_FALLBACK` (comma-separated).
    ///
    /// An unset or non-unicode variable yields an empty set.
    pub fn from_env() -> Self {
        let ops = std::env::var(FORCE_FALLBACK_ENV)
            .map(|value| parse_op_list(&value))
            .unwrap_or_default();
        tracing::debug!(count = ops.len(), "force-fallback set from environment");
        Self {
            force_fallback: RwLock::new(ops),
        }
    }

    pub fn with_force_fallback<I, S>(self, ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_force_fallback(ops);
        self
    }

    /// Snapshot of the current force-fallback set.
    pub fn get_force_fallback(&self) -> BTreeSet<String> {
        self.read().clone()
    }

    /// Replace the force-fallback set.
    pub fn set_force_fallback<I, S>(&self, ops: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.write() = ops.into_iter().map(Into::into).collect();
    }

    /// Whether `op` (lowering to `symbol`, if the backend has one) is
    /// forced onto the fallback path.
    pub fn is_forced(&self, symbol: Option<&str>, op: &OpId) -> bool {
        let set = self.read();
        if set.is_empty() {
            return false;
        }
        symbol.is_some_and(|s| set.contains(s)) || set.contains(&op.qualified_name())
    }

    /// Install `ops` as the force-fallback set until the returned guard is
    /// dropped, then restore the previous set.
    ///
    /// The restore also happens when the guard is dropped during unwinding.
    pub fn force_fallback_scope<I, S>(&self, ops: I) -> ForceFallbackScope<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: BTreeSet<String> = ops.into_iter().map(Into::into).collect();
        let previous = std::mem::replace(&mut *self.write(), next);
        ForceFallbackScope {
            config: self,
            previous: Some(previous),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeSet<String>> {
        self.force_fallback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeSet<String>> {
        self.force_fallback
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for LazyConfig {
    fn clone(&self) -> Self {
        Self {
            force_fallback: RwLock::new(self.get_force_fallback()),
        }
    }
}

/// Guard returned by [`LazyConfig::force_fallback_scope`].
#[must_use = "the previous force-fallback set is restored when the guard is dropped"]
#[derive(Debug)]
pub struct ForceFallbackScope<'c> {
    config: &'c LazyConfig,
    previous: Option<BTreeSet<String>>,
}

impl Drop for ForceFallbackScope<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.config.write() = previous;
        }
    }
}

/// Parse a comma-separated operator list, ignoring blanks.
pub fn parse_op_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .map(str::to_string)
        .collect()
}
