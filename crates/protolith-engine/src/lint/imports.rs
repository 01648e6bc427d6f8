//! Import hygiene rules

use crate::rule::{LintContext, RuleError};
use protolith_core::Finding;
use protolith_image::{Image, ImageFile};
use std::collections::BTreeSet;

pub(super) fn import_no_cycle(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    let mut findings = Vec::new();
    for file in ctx.image.non_import_files() {
        for import in &file.imports {
            let loops_back = import.path == file.path
                || ctx
                    .image
                    .imported_files(&import.path)
                    .iter()
                    .any(|f| f.path == file.path);
            if loops_back {
                findings.push(ctx.finding(
                    &import.location,
                    format!("Import \"{}\" creates an import cycle with \"{}\"", import.path, file.path),
                ));
            }
        }
    }
    Ok(findings)
}

pub(super) fn import_no_public(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(ctx
        .image
        .non_import_files()
        .flat_map(|file| file.imports.iter())
        .filter(|import| import.public)
        .map(|import| ctx.finding(&import.location, format!("Import \"{}\" must not be public", import.path)))
        .collect())
}

/// `path` plus every file it re-exports through public imports
fn public_closure<'i>(image: &'i Image, path: &'i str) -> BTreeSet<&'i str> {
    let mut seen = BTreeSet::from([path]);
    let mut stack = vec![path];

    while let Some(current) = stack.pop() {
        let Some(file) = image.file(current) else {
            continue;
        };
        for import in file.imports.iter().filter(|i| i.public) {
            if seen.insert(import.path.as_str()) {
                stack.push(import.path.as_str());
            }
        }
    }

    seen
}

fn unused_imports<'f>(ctx: &LintContext<'_>, file: &'f ImageFile) -> Vec<&'f protolith_image::Import> {
    let empty = BTreeSet::new();
    let referenced = ctx.cache.referenced_files(&file.path).unwrap_or(&empty);

    file.imports
        .iter()
        // Public and weak imports exist for their importers, not for this file
        .filter(|import| !import.public && !import.weak)
        .filter(|import| {
            !public_closure(ctx.image, &import.path)
                .iter()
                .any(|path| referenced.contains(*path))
        })
        .collect()
}

pub(super) fn import_used(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(ctx
        .image
        .non_import_files()
        .flat_map(|file| {
            unused_imports(ctx, file)
                .into_iter()
                .map(move |import| (file, import))
        })
        .map(|(file, import)| {
            ctx.finding(
                &import.location,
                format!("Import \"{}\" is unused in \"{}\"", import.path, file.path),
            )
        })
        .collect())
}
