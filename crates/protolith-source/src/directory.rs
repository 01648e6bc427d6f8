//! Local workspace directory provider
//!
//! Layout: every directory holding a `module.toml` is a module root. Schema
//! files are stored as parser output next to it, `<path>.json`, and are served
//! under `<path>` relative to the module root:
//!
//! ```text
//! workspace/
//! ├── payments/
//! │   ├── module.toml            # [module] name = "acme/payments"
//! │   └── acme/payments/v1/payment.proto.json
//! └── money/
//!     ├── module.toml
//!     └── acme/money/v1/money.proto.json
//! ```

use crate::provider::{normalize_path, SourceError, SourceFile, SourceProvider};
use protolith_core::{ModuleManifest, ModuleRef};
use semver::VersionReq;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manifest file name marking a module root
pub const MODULE_MANIFEST: &str = "module.toml";

/// Extension of serialized syntax trees
pub const SYNTAX_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
struct LocalModule {
    root: PathBuf,
    manifest: ModuleManifest,
}

/// Provider over a workspace directory
///
/// A directory may hold several versions of one module, as a vendored
/// module cache does.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    modules: BTreeMap<String, BTreeMap<ModuleRef, LocalModule>>,
}

impl DirectoryProvider {
    /// Scan `root` for module manifests
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let root = root.into();
        let mut modules: BTreeMap<String, BTreeMap<ModuleRef, LocalModule>> = BTreeMap::new();

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::Io(e.to_string()))?;
            if entry.file_name() != MODULE_MANIFEST {
                continue;
            }

            let contents = std::fs::read_to_string(entry.path())
                .map_err(|e| SourceError::Io(format!("{}: {}", entry.path().display(), e)))?;
            let manifest = ModuleManifest::from_toml(&contents).map_err(|e| SourceError::InvalidManifest {
                module: entry.path().display().to_string(),
                reason: e.to_string(),
            })?;

            let module_root = entry
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.clone());

            let versions = modules.entry(manifest.module.name.clone()).or_default();
            if let Some(existing) = versions.get(&manifest.module) {
                return Err(SourceError::InvalidManifest {
                    module: manifest.module.to_string(),
                    reason: format!(
                        "declared by both {} and {}",
                        existing.root.display(),
                        module_root.display()
                    ),
                });
            }
            versions.insert(
                manifest.module.clone(),
                LocalModule {
                    root: module_root,
                    manifest,
                },
            );
        }

        Ok(Self { root, modules })
    }

    /// Workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// References of every module found in the workspace, sorted by name then version
    pub fn modules(&self) -> Vec<ModuleRef> {
        self.modules.values().flat_map(|versions| versions.keys().cloned()).collect()
    }

    fn local(&self, module: &ModuleRef) -> Result<&LocalModule, SourceError> {
        self.modules
            .get(&module.name)
            .and_then(|versions| versions.get(module))
            .ok_or_else(|| SourceError::NotFound(module.to_string()))
    }
}

/// Read every syntax file below `module_root`, skipping nested modules
fn read_module_files(module_root: &Path) -> Result<Vec<SourceFile>, SourceError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(module_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.path() == module_root
                || !entry.file_type().is_dir()
                || !entry.path().join(MODULE_MANIFEST).exists()
        });

    for entry in walker {
        let entry = entry.map_err(|e| SourceError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some(SYNTAX_EXTENSION) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(module_root)
            .map_err(|e| SourceError::Io(e.to_string()))?;
        let relative = relative.to_string_lossy();
        let path = relative
            .strip_suffix(&format!(".{}", SYNTAX_EXTENSION))
            .unwrap_or(&relative);

        let content = std::fs::read(entry.path())
            .map_err(|e| SourceError::Io(format!("{}: {}", entry.path().display(), e)))?;
        files.push(SourceFile::new(normalize_path(path), content));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[async_trait::async_trait]
impl SourceProvider for DirectoryProvider {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn resolve_module(&self, name: &str, constraint: &VersionReq) -> Result<ModuleRef, SourceError> {
        let not_found = || SourceError::NotFound(format!("{} {}", name, constraint));
        let versions = self.modules.get(name).ok_or_else(not_found)?;

        // Highest matching version; unversioned modules satisfy any constraint
        versions
            .keys()
            .filter(|r| r.version.as_ref().map(|v| constraint.matches(v)).unwrap_or(false))
            .max_by(|a, b| a.version.cmp(&b.version))
            .or_else(|| versions.keys().find(|r| r.version.is_none()))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn manifest(&self, module: &ModuleRef) -> Result<ModuleManifest, SourceError> {
        Ok(self.local(module)?.manifest.clone())
    }

    async fn list_files(&self, module: &ModuleRef) -> Result<Vec<SourceFile>, SourceError> {
        let root = self.local(module)?.root.clone();
        tokio::task::spawn_blocking(move || read_module_files(&root))
            .await
            .map_err(|e| SourceError::Io(e.to_string()))?
    }
}
