//! Lattice CLI library - shared functionality for testing and binary.

pub mod demo;
pub mod table;
pub mod verify;

/// Output format for `lattice config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TableFormat {
    Text,
    Json,
}
