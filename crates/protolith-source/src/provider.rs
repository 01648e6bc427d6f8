//! Source provider trait for fetching module metadata and schema files

use protolith_core::{Digest, ModuleManifest, ModuleRef};
use semver::VersionReq;

/// One schema file as delivered by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Normalized path, unique within its module
    pub path: String,

    /// Raw bytes
    pub content: Vec<u8>,

    /// Content digest
    pub digest: Digest,
}

impl SourceFile {
    /// Create a file, computing its digest
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            path: normalize_path(&path.into()),
            digest: Digest::of(&content),
            content,
        }
    }
}

/// Normalize a module-relative path: forward slashes, no `.` segments, no leading `/`
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Errors that can occur when fetching from a source
///
/// These mirror the status codes of a remote registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid manifest for {module}: {reason}")]
    InvalidManifest { module: String, reason: String },

    #[error("IO error: {0}")]
    Io(String),
}

/// Trait for anything that can serve modules: local directories, vendored
/// caches, remote registries
///
/// Implementations must be deterministic for a fixed module reference: the
/// same reference always yields the same manifest and the same file digests.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Get the provider name (e.g., "memory", "directory")
    fn name(&self) -> &'static str;

    /// Pick the module reference satisfying a version constraint
    async fn resolve_module(&self, name: &str, constraint: &VersionReq) -> Result<ModuleRef, SourceError>;

    /// Fetch the manifest of a resolved module
    async fn manifest(&self, module: &ModuleRef) -> Result<ModuleManifest, SourceError>;

    /// List the schema files of a module, ordered by path
    async fn list_files(&self, module: &ModuleRef) -> Result<Vec<SourceFile>, SourceError>;
}
