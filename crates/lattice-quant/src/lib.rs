//! Quantization backend configuration for Lattice.
//!
//! A backend configuration is a [`PatternTable`]: an ordered list of
//! operator [`Pattern`]s, each mapped to a [`BackendPatternConfig`] that
//! says how the matched computation is observed, which dtype combinations
//! the backend supports, and how a matched chain fuses.
//!
//! Tables are assembled once by a [`ConfigResolver`] from per-family
//! generator functions (linear, conv, binary ops, fixed-qparams ops, ...)
//! and are read-only afterwards. [`PatternMatcher`] resolves the best
//! entry for a node of a captured graph, preferring the longest chain.
//!
//! ```ignore
//! let table = lattice_quant::native_backend_config()?;
//! let matcher = PatternMatcher::new(&table);
//! if let Some(m) = matcher.match_node(&graph, node_id)? {
//!     println!("{} -> {:?}", m.pattern, m.config.observation);
//! }
//! ```

pub mod config;
pub mod dtype_config;
pub mod fuser;
pub mod matcher;
pub mod native;
pub mod observation;
pub mod observer;
pub mod pattern;
pub mod resolver;
pub mod table;

pub use config::BackendPatternConfig;
pub use dtype_config::DTypeConfig;
pub use fuser::FuserMethod;
pub use matcher::{GraphMatches, PatternMatch, PatternMatcher};
pub use native::{native_backend_config, native_config_resolver};
pub use observation::{ObservationStrategy, ObservationType};
pub use observer::{FakeQuantizeSpec, ObserverSpec};
pub use pattern::Pattern;
pub use resolver::{ConfigResolver, PatternEntry};
pub use table::PatternTable;

/// Result type for quantization configuration operations.
pub type Result<T> = std::result::Result<T, QuantError>;

/// Error type for quantization configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum QuantError {
    #[error(
        "Duplicate pattern {pattern}: registered by generator '{generator}', already defined by '{existing}'"
    )]
    DuplicatePattern {
        pattern: Pattern,
        generator: String,
        existing: String,
    },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Fusion error: {0}")]
    Fusion(String),

    #[error(transparent)]
    Core(#[from] lattice_core::Error),
}
