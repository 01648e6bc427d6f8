//! The resolved image
//!
//! An [`Image`] is immutable once built. Every type reference inside it is
//! bound to exactly one declaration, so it can be shared across concurrent
//! rule evaluations without further validation.

use crate::tree::{DeclKind, Declaration, Import, OptionAssignment, TypeRef};
use protolith_core::{Digest, Location, ModuleRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One file of the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    pub module: ModuleRef,
    pub path: String,
    pub digest: Digest,
    pub package: Option<String>,
    pub package_location: Option<Location>,
    pub imports: Vec<Import>,
    pub options: Vec<OptionAssignment>,

    /// Belongs to a dependency module rather than a workspace root
    pub is_import: bool,

    pub declarations: Vec<Declaration>,
}

impl ImageFile {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.iter().find(|o| o.name == name).map(|o| o.value.as_str())
    }

    pub fn declarations_of(&self, kind: DeclKind) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }

    /// Direct children of the declaration at `index`
    pub fn children(&self, index: usize) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.parent == Some(index))
    }

    pub fn parent(&self, declaration: &Declaration) -> Option<&Declaration> {
        declaration.parent.and_then(|p| self.declarations.get(p))
    }

    pub fn location(&self) -> Location {
        Location::new(self.path.clone())
    }
}

/// Position of a declaration inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclHandle {
    pub file: usize,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    files: Vec<ImageFile>,
    by_path: BTreeMap<String, usize>,
    by_name: BTreeMap<String, DeclHandle>,

    /// Transitive import closure per file, as sorted file indexes
    closure: Vec<Vec<usize>>,
}

impl Image {
    /// Index `files`; callers guarantee unique paths and names
    pub(crate) fn new(files: Vec<ImageFile>) -> Self {
        let by_path: BTreeMap<String, usize> = files.iter().enumerate().map(|(i, f)| (f.path.clone(), i)).collect();

        let mut by_name = BTreeMap::new();
        for (file, f) in files.iter().enumerate() {
            for (index, declaration) in f.declarations.iter().enumerate() {
                by_name
                    .entry(declaration.full_name.clone())
                    .or_insert(DeclHandle { file, index });
            }
        }

        let closure = (0..files.len())
            .map(|start| import_closure(&files, &by_path, start, |_| true))
            .collect();

        Self {
            files,
            by_path,
            by_name,
            closure,
        }
    }

    /// Files in build order: dependency modules first, then by path
    pub fn files(&self) -> &[ImageFile] {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&ImageFile> {
        self.by_path.get(path).map(|&i| &self.files[i])
    }

    /// Files of the workspace roots, the ones rules report on
    pub fn non_import_files(&self) -> impl Iterator<Item = &ImageFile> {
        self.files.iter().filter(|f| !f.is_import)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Declaration by fully-qualified name
    pub fn lookup(&self, full_name: &str) -> Option<(&ImageFile, &Declaration)> {
        self.by_name.get(full_name).map(|h| self.get(*h))
    }

    pub fn handle(&self, full_name: &str) -> Option<DeclHandle> {
        self.by_name.get(full_name).copied()
    }

    pub fn get(&self, handle: DeclHandle) -> (&ImageFile, &Declaration) {
        let file = &self.files[handle.file];
        (file, &file.declarations[handle.index])
    }

    /// Declaration a bound type reference points at
    pub fn resolve(&self, reference: &TypeRef) -> Option<(&ImageFile, &Declaration)> {
        reference.target.as_deref().and_then(|t| self.lookup(t))
    }

    /// Every declaration with its file, in file order
    pub fn declarations(&self) -> impl Iterator<Item = (&ImageFile, &Declaration)> {
        self.files
            .iter()
            .flat_map(|f| f.declarations.iter().map(move |d| (f, d)))
    }

    /// Fully-qualified names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(|k| k.as_str())
    }

    /// Files imported by `path`, directly or transitively, in build order
    pub fn imported_files(&self, path: &str) -> Vec<&ImageFile> {
        self.by_path
            .get(path)
            .map(|&i| self.closure[i].iter().map(|&j| &self.files[j]).collect())
            .unwrap_or_default()
    }

    /// Deterministic JSON rendering
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Files reachable from `start` through imports accepted by `follow`, excluding `start`
pub(crate) fn import_closure(
    files: &[ImageFile],
    by_path: &BTreeMap<String, usize>,
    start: usize,
    follow: impl Fn(&Import) -> bool,
) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        for import in files[current].imports.iter().filter(|&i| follow(i)) {
            if let Some(&next) = by_path.get(&import.path) {
                if next != start && seen.insert(next) {
                    stack.push(next);
                }
            }
        }
    }

    seen.into_iter().collect()
}
