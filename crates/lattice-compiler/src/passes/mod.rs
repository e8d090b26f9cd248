//! Graph passes run before extraction.

mod dce;
mod fusion;

pub use dce::DeadCodeEliminationPass;
pub use fusion::FusionPass;
