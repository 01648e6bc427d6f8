//! Schema sources for module resolution
//!
//! This crate provides the seam between the toolchain and wherever modules
//! live: a local workspace directory, a vendored cache, a remote registry.
//!
//! ## Providers
//!
//! - [`MemoryProvider`] - in-memory modules, failure and latency simulation
//! - [`DirectoryProvider`] - local workspace directory
//! - [`LayeredProvider`] - precedence between overlapping sources
//! - [`CachedProvider`] - cache-first wrapper around any provider
//!
//! ## Example
//!
//! ```rust,ignore
//! use protolith_source::{CachedProvider, DirectoryProvider, LayeredProvider, SourceProvider};
//!
//! let provider = LayeredProvider::new()
//!     .with_layer(Arc::new(DirectoryProvider::open("workspace")?))
//!     .with_layer(Arc::new(CachedProvider::new(Arc::new(registry))));
//! let files = provider.list_files(&module).await?;
//! ```

pub mod cache;
pub mod directory;
pub mod layered;
pub mod memory;
pub mod provider;

pub use cache::CachedProvider;
pub use directory::DirectoryProvider;
pub use layered::LayeredProvider;
pub use memory::{MemoryModule, MemoryProvider};
pub use provider::{normalize_path, SourceError, SourceFile, SourceProvider};
