//! Module dependency resolution
//!
//! This crate handles:
//! - Fetching module manifests through a [`SourceProvider`](protolith_source::SourceProvider)
//! - Selecting one version per module (diamond dependencies)
//! - Rejecting dependency cycles
//! - The deterministic build order and root distances used for file shadowing

pub mod error;
pub mod graph;
pub mod resolver;

pub use error::ResolutionError;
pub use graph::{ModuleGraph, ModuleId, ResolvedModule};
pub use resolver::{cancellable, resolve};
