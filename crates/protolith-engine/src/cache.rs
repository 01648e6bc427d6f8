//! Per-run index cache
//!
//! Indexes are built on first use and never invalidated: the image they
//! describe is immutable for the lifetime of the run.

use once_cell::sync::OnceCell;
use protolith_image::{DeclHandle, DeclPath, Image, ImageFile};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub struct RunCache {
    image: Arc<Image>,

    /// package -> indexes of the workspace files declaring it
    by_package: OnceCell<BTreeMap<String, Vec<usize>>>,

    /// (file path, structural path) -> declaration
    by_path: OnceCell<BTreeMap<(String, DeclPath), DeclHandle>>,

    /// file path -> files its declarations reference
    referenced: OnceCell<BTreeMap<String, BTreeSet<String>>>,
}

impl RunCache {
    pub fn new(image: Arc<Image>) -> Self {
        Self {
            image,
            by_package: OnceCell::new(),
            by_path: OnceCell::new(),
            referenced: OnceCell::new(),
        }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Workspace files declaring `package`, in image order
    pub fn package_files(&self, package: &str) -> impl Iterator<Item = &ImageFile> {
        let index = self.by_package.get_or_init(|| {
            let mut index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
            for (i, file) in self.image.files().iter().enumerate() {
                if let (false, Some(package)) = (file.is_import, &file.package) {
                    index.entry(package.clone()).or_default().push(i);
                }
            }
            index
        });
        let files = self.image.files();
        index
            .get(package)
            .into_iter()
            .flatten()
            .filter_map(move |&i| files.get(i))
    }

    /// Declaration at a structural path of a file
    pub fn at_path(&self, file: &str, path: &DeclPath) -> Option<DeclHandle> {
        let index = self.by_path.get_or_init(|| {
            let mut index = BTreeMap::new();
            for (file, f) in self.image.files().iter().enumerate() {
                for (i, declaration) in f.declarations.iter().enumerate() {
                    index.insert((f.path.clone(), declaration.path.clone()), DeclHandle { file, index: i });
                }
            }
            index
        });
        index.get(&(file.to_string(), path.clone())).copied()
    }

    /// Files declaring a type referenced from `file`, the file itself excluded
    pub fn referenced_files(&self, file: &str) -> Option<&BTreeSet<String>> {
        let index = self.referenced.get_or_init(|| {
            self.image
                .files()
                .iter()
                .map(|f| (f.path.clone(), self.references_of(f)))
                .collect()
        });
        index.get(file)
    }

    fn references_of(&self, file: &ImageFile) -> BTreeSet<String> {
        file.declarations
            .iter()
            .flat_map(|d| d.references())
            .filter_map(|r| self.image.resolve(r))
            .map(|(target, _)| target.path.clone())
            .filter(|path| *path != file.path)
            .collect()
    }
}

impl std::fmt::Debug for RunCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCache")
            .field("files", &self.image.len())
            .field("by_package", &self.by_package.get().is_some())
            .field("by_path", &self.by_path.get().is_some())
            .field("referenced", &self.referenced.get().is_some())
            .finish()
    }
}
