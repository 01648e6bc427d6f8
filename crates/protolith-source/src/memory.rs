//! In-memory source provider
//!
//! Serves modules held in memory. It's useful for:
//! - Unit testing resolution and image building
//! - Embedding the toolchain where schema files never touch disk
//! - Simulating provider failures and slow fetches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use protolith_source::{MemoryModule, MemoryProvider};
//!
//! let provider = MemoryProvider::new()
//!     .with_module(MemoryModule::local("acme/money").with_file("acme/money/v1/money.proto", bytes))
//!     .with_latency("acme/money", 20);
//! ```

use crate::provider::{SourceError, SourceFile, SourceProvider};
use protolith_core::{Dependency, Digest, ModuleManifest, ModuleRef};
use semver::{Version, VersionReq};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A module held by [`MemoryProvider`]
#[derive(Debug, Clone)]
pub struct MemoryModule {
    pub manifest: ModuleManifest,
    pub files: BTreeMap<String, SourceFile>,
}

impl MemoryModule {
    pub fn new(module: ModuleRef) -> Self {
        Self {
            manifest: ModuleManifest::new(module),
            files: BTreeMap::new(),
        }
    }

    /// Unversioned workspace module
    pub fn local(name: &str) -> Self {
        Self::new(ModuleRef::local(name))
    }

    pub fn versioned(name: &str, version: Version) -> Self {
        Self::new(ModuleRef::versioned(name, version))
    }

    /// Module identified by a content digest instead of a version
    pub fn pinned(name: &str, digest: Digest) -> Self {
        Self::new(ModuleRef::pinned(name, digest))
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.manifest.dependencies.push(dependency);
        self
    }

    pub fn with_compatibility(mut self, compatibility: VersionReq) -> Self {
        self.manifest.compatibility = Some(compatibility);
        self
    }

    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        let file = SourceFile::new(path, content);
        self.files.insert(file.path.clone(), file);
        self
    }
}

/// In-memory provider with failure and latency simulation
///
/// # Features
///
/// - Serve any number of versions per module name
/// - Simulate per-module errors
/// - Simulate per-module fetch latency (to shuffle completion order)
/// - Count provider calls, for cache tests
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    /// Modules by name, then by reference
    modules: BTreeMap<String, BTreeMap<ModuleRef, MemoryModule>>,

    /// Errors to return for specific module names
    errors: BTreeMap<String, SourceError>,

    /// Simulated latency per module name (milliseconds)
    latency_ms: BTreeMap<String, u64>,

    /// Number of provider calls served
    calls: Arc<AtomicUsize>,
}

impl MemoryProvider {
    /// Create a provider with no modules
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module
    pub fn with_module(mut self, module: MemoryModule) -> Self {
        let reference = module.manifest.module.clone();
        self.modules
            .entry(reference.name.clone())
            .or_default()
            .insert(reference, module);
        self
    }

    /// Configure an error to be returned for every call about `name`
    pub fn with_error(mut self, name: &str, error: SourceError) -> Self {
        self.errors.insert(name.to_string(), error);
        self
    }

    /// Configure simulated latency for calls about `name`
    pub fn with_latency(mut self, name: &str, latency_ms: u64) -> Self {
        self.latency_ms.insert(name.to_string(), latency_ms);
        self
    }

    /// Number of trait calls served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, name: &str) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency_ms.get(name) {
            tokio::time::sleep(std::time::Duration::from_millis(*latency)).await;
        }

        match self.errors.get(name) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn module(&self, reference: &ModuleRef) -> Result<&MemoryModule, SourceError> {
        self.modules
            .get(&reference.name)
            .and_then(|versions| versions.get(reference))
            .ok_or_else(|| SourceError::NotFound(reference.to_string()))
    }
}

#[async_trait::async_trait]
impl SourceProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn resolve_module(&self, name: &str, constraint: &VersionReq) -> Result<ModuleRef, SourceError> {
        self.enter(name).await?;

        let versions = self
            .modules
            .get(name)
            .ok_or_else(|| SourceError::NotFound(format!("{} {}", name, constraint)))?;

        // Highest matching version; unversioned modules satisfy any constraint
        let versioned = versions
            .keys()
            .filter(|r| r.version.as_ref().map(|v| constraint.matches(v)).unwrap_or(false))
            .max_by(|a, b| a.version.cmp(&b.version));

        versioned
            .or_else(|| versions.keys().find(|r| r.version.is_none()))
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("{} {}", name, constraint)))
    }

    async fn manifest(&self, module: &ModuleRef) -> Result<ModuleManifest, SourceError> {
        self.enter(&module.name).await?;
        Ok(self.module(module)?.manifest.clone())
    }

    async fn list_files(&self, module: &ModuleRef) -> Result<Vec<SourceFile>, SourceError> {
        self.enter(&module.name).await?;
        Ok(self.module(module)?.files.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_highest_matching_version() {
        let provider = MemoryProvider::new()
            .with_module(MemoryModule::versioned("acme/money", Version::new(1, 2, 0)))
            .with_module(MemoryModule::versioned("acme/money", Version::new(1, 4, 1)))
            .with_module(MemoryModule::versioned("acme/money", Version::new(2, 0, 0)));

        let resolved = provider
            .resolve_module("acme/money", &VersionReq::parse("^1.2").unwrap())
            .await
            .unwrap();
        assert_eq!(resolved.version, Some(Version::new(1, 4, 1)));
    }

    #[tokio::test]
    async fn unknown_module_is_not_found() {
        let provider = MemoryProvider::new();
        let result = provider.resolve_module("acme/missing", &VersionReq::STAR).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn configured_error_is_returned() {
        let provider = MemoryProvider::new()
            .with_module(MemoryModule::local("acme/api"))
            .with_error("acme/api", SourceError::Unavailable("registry down".to_string()));

        let result = provider.manifest(&ModuleRef::local("acme/api")).await;
        assert_eq!(result, Err(SourceError::Unavailable("registry down".to_string())));
    }

    #[tokio::test]
    async fn files_are_listed_by_path() {
        let provider = MemoryProvider::new().with_module(
            MemoryModule::local("acme/api")
                .with_file("b.proto", b"b".to_vec())
                .with_file("a.proto", b"a".to_vec()),
        );

        let files = provider.list_files(&ModuleRef::local("acme/api")).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.proto", "b.proto"]);
        assert_eq!(provider.call_count(), 1);
    }
}
