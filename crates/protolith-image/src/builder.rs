//! Image builder
//!
//! Merges the declaration trees of every resolved module into one image:
//!
//! 1. Same-path files across modules are reduced to one (closer to a root wins)
//! 2. Files are ordered by module build order, then path
//! 3. Imports, names and structural invariants are checked
//! 4. Every type reference is bound to the declaration it names
//!
//! All problems are collected before failing, so one build reports every error.

use crate::error::{BuildError, BuildErrors};
use crate::image::{import_closure, DeclHandle, Image, ImageFile};
use crate::tree::{DeclDetail, DeclKind, Declaration, DeclarationTree, FileId, TypeRef};
use protolith_graph::ModuleGraph;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Largest valid field number
pub const MAX_FIELD_NUMBER: i32 = 536_870_911;

/// Build an image from the resolved graph and the trees of every module file
///
/// Trees of modules that are not part of `graph`, or of another version of a
/// graph module, are ignored.
pub fn build(graph: &ModuleGraph, trees: BTreeMap<FileId, DeclarationTree>) -> Result<Image, BuildErrors> {
    let mut errors = Vec::new();

    let mut files = select_files(graph, trees, &mut errors);
    let by_path: BTreeMap<String, usize> = files.iter().enumerate().map(|(i, f)| (f.path.clone(), i)).collect();

    check_imports(&files, &by_path, &mut errors);
    let names = index_names(&files, &mut errors);
    for file in &files {
        check_structure(file, &mut errors);
    }
    bind_references(&mut files, &by_path, &names, &mut errors);

    if errors.is_empty() {
        Ok(Image::new(files))
    } else {
        Err(BuildErrors::new(errors))
    }
}

/// Apply path precedence and order the surviving files
fn select_files(
    graph: &ModuleGraph,
    trees: BTreeMap<FileId, DeclarationTree>,
    errors: &mut Vec<BuildError>,
) -> Vec<ImageFile> {
    let position: BTreeMap<&str, usize> = graph
        .build_order()
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    // path -> (distance, build position, tree)
    let mut by_path: BTreeMap<String, Vec<(usize, usize, DeclarationTree)>> = BTreeMap::new();
    for (id, tree) in trees {
        let name = id.module.name.as_str();
        let Some(module) = graph.module(name).filter(|m| m.reference == id.module) else {
            continue;
        };
        if let Some(&order) = position.get(name) {
            by_path.entry(id.path).or_default().push((module.distance, order, tree));
        }
    }

    let mut selected = Vec::new();
    for (path, mut candidates) in by_path {
        candidates.sort_by_key(|(distance, order, _)| (*distance, *order));
        let mut candidates = candidates.into_iter();
        let Some((distance, order, winner)) = candidates.next() else {
            continue;
        };

        let tied = candidates.take_while(|(d, _, _)| *d == distance);
        for (_, _, other) in tied {
            if other.digest != winner.digest {
                errors.push(BuildError::ConflictingFile {
                    path: path.clone(),
                    first: winner.file.module.to_string(),
                    second: other.file.module.to_string(),
                });
                break;
            }
        }

        selected.push((order, winner));
    }

    selected.sort_by(|(a, ta), (b, tb)| (a, &ta.file.path).cmp(&(b, &tb.file.path)));
    selected
        .into_iter()
        .map(|(_, tree)| ImageFile {
            is_import: !graph.is_root(&tree.file.module.name),
            module: tree.file.module,
            path: tree.file.path,
            digest: tree.digest,
            package: tree.package,
            package_location: tree.package_location,
            imports: tree.imports,
            options: tree.options,
            declarations: tree.declarations,
        })
        .collect()
}

fn check_imports(files: &[ImageFile], by_path: &BTreeMap<String, usize>, errors: &mut Vec<BuildError>) {
    for file in files {
        for import in &file.imports {
            if !by_path.contains_key(&import.path) {
                errors.push(BuildError::UnresolvedImport {
                    path: import.path.clone(),
                    location: import.location.clone(),
                });
            }
        }
    }
}

/// Global name index; later duplicates are errors
fn index_names(files: &[ImageFile], errors: &mut Vec<BuildError>) -> BTreeMap<String, DeclHandle> {
    let mut names: BTreeMap<String, DeclHandle> = BTreeMap::new();

    for (file, f) in files.iter().enumerate() {
        for (index, declaration) in f.declarations.iter().enumerate() {
            match names.get(&declaration.full_name) {
                Some(previous) => {
                    let previous = &files[previous.file].declarations[previous.index];
                    errors.push(BuildError::DuplicateDeclaration {
                        name: declaration.full_name.clone(),
                        location: declaration.location.clone(),
                        previous: previous.location.clone(),
                    });
                }
                None => {
                    names.insert(declaration.full_name.clone(), DeclHandle { file, index });
                }
            }
        }
    }

    names
}

/// Field numbering, enum numbering and reservations
fn check_structure(file: &ImageFile, errors: &mut Vec<BuildError>) {
    for (index, declaration) in file.declarations.iter().enumerate() {
        match declaration.kind {
            DeclKind::Message => check_message(file, index, declaration, errors),
            DeclKind::Enum => check_enum(file, index, declaration, errors),
            _ => {}
        }
    }
}

fn check_reserved(owner: &Declaration, member: &Declaration, number: i32, errors: &mut Vec<BuildError>) {
    let Some((ranges, names)) = owner.reserved() else {
        return;
    };

    if ranges.iter().any(|r| r.contains(number)) {
        errors.push(BuildError::ReservedNumber {
            name: member.full_name.clone(),
            number,
            location: member.location.clone(),
        });
    }
    if names.iter().any(|n| *n == member.name) {
        errors.push(BuildError::ReservedName {
            name: member.full_name.clone(),
            location: member.location.clone(),
        });
    }
}

fn check_message(file: &ImageFile, index: usize, message: &Declaration, errors: &mut Vec<BuildError>) {
    let mut numbers: BTreeMap<i32, &str> = BTreeMap::new();

    for field in file.children(index).filter(|d| d.kind == DeclKind::Field) {
        let Some(number) = field.number() else {
            continue;
        };

        if !(1..=MAX_FIELD_NUMBER).contains(&number) {
            errors.push(BuildError::InvalidFieldNumber {
                name: field.full_name.clone(),
                number,
                location: field.location.clone(),
            });
        } else if let Some(previous) = numbers.get(&number) {
            errors.push(BuildError::DuplicateFieldNumber {
                message: message.full_name.clone(),
                number,
                previous: previous.to_string(),
                location: field.location.clone(),
            });
        } else {
            numbers.insert(number, &field.name);
        }

        check_reserved(message, field, number, errors);
    }
}

fn check_enum(file: &ImageFile, index: usize, en: &Declaration, errors: &mut Vec<BuildError>) {
    let allow_alias = en.option("allow_alias") == Some("true");
    let mut numbers: BTreeMap<i32, &str> = BTreeMap::new();

    for value in file.children(index).filter(|d| d.kind == DeclKind::EnumValue) {
        let Some(number) = value.number() else {
            continue;
        };

        match numbers.get(&number) {
            Some(previous) if !allow_alias => errors.push(BuildError::DuplicateEnumNumber {
                enum_name: en.full_name.clone(),
                number,
                previous: previous.to_string(),
                location: value.location.clone(),
            }),
            Some(_) => {}
            None => {
                numbers.insert(number, &value.name);
            }
        }

        check_reserved(en, value, number, errors);
    }
}

/// What a reference may bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Message,
    MessageOrEnum,
}

impl Expect {
    fn accepts(&self, kind: DeclKind) -> bool {
        match self {
            Self::Message => kind == DeclKind::Message,
            Self::MessageOrEnum => kind.is_type(),
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => f.write_str("message"),
            Self::MessageOrEnum => f.write_str("message or enum"),
        }
    }
}

/// References of a declaration with their expected kinds, in
/// [`Declaration::references_mut`] order
fn expectations(declaration: &Declaration) -> Vec<(&TypeRef, Expect)> {
    match &declaration.detail {
        DeclDetail::Field { ty, extendee, .. } => ty
            .references()
            .into_iter()
            .map(|r| (r, Expect::MessageOrEnum))
            .chain(extendee.iter().map(|r| (r, Expect::Message)))
            .collect(),
        DeclDetail::Method { input, output, .. } => vec![(input, Expect::Message), (output, Expect::Message)],
        _ => Vec::new(),
    }
}

/// Candidate full names for `name` looked up from `scope`, innermost first
fn candidates(name: &str, scope: &str) -> Vec<String> {
    if let Some(absolute) = name.strip_prefix('.') {
        return vec![absolute.to_string()];
    }

    let mut out = Vec::new();
    let mut scope = scope;
    loop {
        if scope.is_empty() {
            out.push(name.to_string());
            return out;
        }
        out.push(format!("{}.{}", scope, name));
        scope = scope.rfind('.').map(|i| &scope[..i]).unwrap_or("");
    }
}

/// Files whose declarations `file` may name: itself, direct imports, and
/// the transitive public imports of those
fn visible_files(files: &[ImageFile], by_path: &BTreeMap<String, usize>, file: usize) -> BTreeSet<usize> {
    let mut visible = BTreeSet::from([file]);
    for import in &files[file].imports {
        if let Some(&direct) = by_path.get(&import.path) {
            visible.insert(direct);
            visible.extend(import_closure(files, by_path, direct, |i| i.public));
        }
    }
    visible
}

struct Binder<'a> {
    files: &'a [ImageFile],
    names: &'a BTreeMap<String, DeclHandle>,
}

impl Binder<'_> {
    fn bind(&self, name: &str, scope: &str, expect: Expect, visible: &BTreeSet<usize>) -> Result<String, Option<String>> {
        let mut hint = None;

        for candidate in candidates(name, scope) {
            let Some(handle) = self.names.get(&candidate) else {
                continue;
            };
            let target = &self.files[handle.file].declarations[handle.index];

            if !expect.accepts(target.kind) {
                hint.get_or_insert_with(|| format!("{} is a {}, not a {}", candidate, target.kind, expect));
                continue;
            }
            if !visible.contains(&handle.file) {
                hint.get_or_insert_with(|| {
                    format!(
                        "{} is defined in {}, which is not imported",
                        candidate, self.files[handle.file].path
                    )
                });
                continue;
            }
            return Ok(candidate);
        }

        Err(hint)
    }
}

fn bind_references(
    files: &mut [ImageFile],
    by_path: &BTreeMap<String, usize>,
    names: &BTreeMap<String, DeclHandle>,
    errors: &mut Vec<BuildError>,
) {
    // (file, declaration, targets in reference order)
    let mut bindings: Vec<(usize, usize, Vec<Option<String>>)> = Vec::new();

    {
        let shared: &[ImageFile] = files;
        let binder = Binder { files: shared, names };
        for (file, f) in shared.iter().enumerate() {
            let visible = visible_files(shared, by_path, file);

            for (index, declaration) in f.declarations.iter().enumerate() {
                let references = expectations(declaration);
                if references.is_empty() {
                    continue;
                }

                let scope = f
                    .parent(declaration)
                    .map(|p| p.full_name.as_str())
                    .or(f.package.as_deref())
                    .unwrap_or("");

                let targets = references
                    .into_iter()
                    .map(|(reference, expect)| match binder.bind(&reference.name, scope, expect, &visible) {
                        Ok(target) => Some(target),
                        Err(hint) => {
                            errors.push(BuildError::UnresolvedType {
                                name: reference.name.clone(),
                                location: declaration.location.clone(),
                                hint,
                            });
                            None
                        }
                    })
                    .collect();

                bindings.push((file, index, targets));
            }
        }
    }

    for (file, index, targets) in bindings {
        let declaration = &mut files[file].declarations[index];
        for (reference, target) in declaration.references_mut().into_iter().zip(targets) {
            reference.target = target;
        }
    }
}
