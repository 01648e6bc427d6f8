//! Cache-first wrapper around a source provider
//!
//! Module references are deterministic (same reference, same content), so
//! entries never expire. Failed lookups are not cached: a retry after a
//! `Unavailable` error goes back to the inner provider.

use crate::provider::{SourceError, SourceFile, SourceProvider};
use protolith_core::{ModuleManifest, ModuleRef};
use semver::VersionReq;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Memoizing provider
///
/// ## Usage
///
/// ```rust,ignore
/// let provider = CachedProvider::new(Arc::new(remote));
/// let first = provider.list_files(&module).await?;  // hits the registry
/// let again = provider.list_files(&module).await?;  // served from memory
/// ```
pub struct CachedProvider {
    inner: Arc<dyn SourceProvider>,
    resolved: RwLock<HashMap<(String, String), ModuleRef>>,
    manifests: RwLock<HashMap<ModuleRef, ModuleManifest>>,
    files: RwLock<HashMap<ModuleRef, Arc<Vec<SourceFile>>>>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn SourceProvider>) -> Self {
        Self {
            inner,
            resolved: RwLock::new(HashMap::new()),
            manifests: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached entries across all request shapes
    pub fn len(&self) -> usize {
        let count = |n: Option<usize>| n.unwrap_or(0);
        count(self.resolved.read().ok().map(|c| c.len()))
            + count(self.manifests.read().ok().map(|c| c.len()))
            + count(self.files.read().ok().map(|c| c.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        if let Ok(mut cache) = self.resolved.write() {
            cache.clear();
        }
        if let Ok(mut cache) = self.manifests.write() {
            cache.clear();
        }
        if let Ok(mut cache) = self.files.write() {
            cache.clear();
        }
    }
}

#[async_trait::async_trait]
impl SourceProvider for CachedProvider {
    fn name(&self) -> &'static str {
        "cached"
    }

    async fn resolve_module(&self, name: &str, constraint: &VersionReq) -> Result<ModuleRef, SourceError> {
        let key = (name.to_string(), constraint.to_string());
        if let Some(hit) = self.resolved.read().ok().and_then(|c| c.get(&key).cloned()) {
            return Ok(hit);
        }

        let module = self.inner.resolve_module(name, constraint).await?;
        if let Ok(mut cache) = self.resolved.write() {
            cache.insert(key, module.clone());
        }
        Ok(module)
    }

    async fn manifest(&self, module: &ModuleRef) -> Result<ModuleManifest, SourceError> {
        if let Some(hit) = self.manifests.read().ok().and_then(|c| c.get(module).cloned()) {
            return Ok(hit);
        }

        let manifest = self.inner.manifest(module).await?;
        if let Ok(mut cache) = self.manifests.write() {
            cache.insert(module.clone(), manifest.clone());
        }
        Ok(manifest)
    }

    async fn list_files(&self, module: &ModuleRef) -> Result<Vec<SourceFile>, SourceError> {
        if let Some(hit) = self.files.read().ok().and_then(|c| c.get(module).cloned()) {
            return Ok(hit.as_ref().clone());
        }

        let files = Arc::new(self.inner.list_files(module).await?);
        if let Ok(mut cache) = self.files.write() {
            cache.insert(module.clone(), Arc::clone(&files));
        }
        Ok(files.as_ref().clone())
    }
}
