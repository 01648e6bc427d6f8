//! Overlapping sources with precedence
//!
//! A workspace usually sees the same module through several sources: the
//! local checkout, a vendored cache and a remote registry. Layers are
//! consulted in order; the first layer that knows a module answers for it,
//! and when several layers list the same file path of one module, the
//! earliest layer's file wins.

use crate::provider::{SourceError, SourceFile, SourceProvider};
use protolith_core::{ModuleManifest, ModuleRef};
use semver::VersionReq;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered stack of providers, highest precedence first
#[derive(Clone, Default)]
pub struct LayeredProvider {
    layers: Vec<Arc<dyn SourceProvider>>,
}

impl LayeredProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer below every existing one
    pub fn with_layer(mut self, layer: Arc<dyn SourceProvider>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

#[async_trait::async_trait]
impl SourceProvider for LayeredProvider {
    fn name(&self) -> &'static str {
        "layered"
    }

    async fn resolve_module(&self, name: &str, constraint: &VersionReq) -> Result<ModuleRef, SourceError> {
        for layer in &self.layers {
            match layer.resolve_module(name, constraint).await {
                Err(SourceError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(SourceError::NotFound(format!("{} {}", name, constraint)))
    }

    async fn manifest(&self, module: &ModuleRef) -> Result<ModuleManifest, SourceError> {
        for layer in &self.layers {
            match layer.manifest(module).await {
                Err(SourceError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(SourceError::NotFound(module.to_string()))
    }

    async fn list_files(&self, module: &ModuleRef) -> Result<Vec<SourceFile>, SourceError> {
        let mut merged: BTreeMap<String, SourceFile> = BTreeMap::new();
        let mut found = false;

        for layer in &self.layers {
            let files = match layer.list_files(module).await {
                Ok(files) => files,
                Err(SourceError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            found = true;

            for file in files {
                merged.entry(file.path.clone()).or_insert(file);
            }
        }

        if !found {
            return Err(SourceError::NotFound(module.to_string()));
        }
        Ok(merged.into_values().collect())
    }
}
