//! Package layout rules

use super::naming::is_lower_snake_case;
use crate::rule::{LintContext, RuleError};
use once_cell::sync::Lazy;
use protolith_core::Finding;
use protolith_image::ImageFile;
use regex::Regex;
use std::collections::BTreeSet;

/// `v<major>`, `v<major>test...`, `v<major>[p<minor>](alpha|beta)<n>`
static VERSION_COMPONENT: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^v(\d+)(?:(?:p(\d+))?(?:alpha|beta)(\d+)|test.*)?$"));

/// Check whether the last component of `package` is a version
///
/// Major, minor and pre-release numbers must all be at least 1, and the
/// package needs at least one component before the version.
pub fn has_version_suffix(package: &str) -> bool {
    let Ok(pattern) = VERSION_COMPONENT.as_ref() else {
        return false;
    };

    let mut components = package.rsplit('.');
    let (Some(last), Some(_)) = (components.next(), components.next()) else {
        return false;
    };

    let Some(captures) = pattern.captures(last) else {
        return false;
    };

    (1..=3).all(|group| {
        captures
            .get(group)
            .map(|m| m.as_str().parse::<u64>().map(|n| n >= 1).unwrap_or(false))
            .unwrap_or(true)
    })
}

fn package_location(file: &ImageFile) -> protolith_core::Location {
    file.package_location.clone().unwrap_or_else(|| file.location())
}

/// Run `check` over the package of every workspace file that has one
fn each_package<F>(ctx: &LintContext<'_>, mut check: F) -> Result<Vec<Finding>, RuleError>
where
    F: FnMut(&ImageFile, &str) -> Option<String>,
{
    Ok(ctx
        .image
        .non_import_files()
        .filter_map(|file| {
            let package = file.package.as_deref()?;
            check(file, package).map(|message| ctx.finding(&package_location(file), message))
        })
        .collect())
}

pub(super) fn package_defined(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(ctx
        .image
        .non_import_files()
        .filter(|f| f.package.is_none())
        .map(|f| ctx.finding(&f.location(), format!("File \"{}\" does not declare a package", f.path)))
        .collect())
}

pub(super) fn package_directory_match(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_package(ctx, |file, package| {
        let directory = directory_of(&file.path);
        let expected = package.replace('.', "/");
        (directory != expected).then(|| {
            format!(
                "Files with package \"{}\" must be within a directory \"{}\" relative to the module root, but \"{}\" is in \"{}\"",
                package, expected, file.path, directory
            )
        })
    })
}

/// Every workspace file of a package lives in one directory
pub(super) fn package_same_directory(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_package(ctx, |file, package| {
        let directory = directory_of(&file.path);
        let others: BTreeSet<&str> = ctx
            .cache
            .package_files(package)
            .map(|f| directory_of(&f.path))
            .filter(|d| *d != directory)
            .collect();
        (!others.is_empty()).then(|| {
            format!(
                "Files with package \"{}\" are in multiple directories: \"{}\" and {}",
                package,
                directory,
                others.iter().map(|d| format!("\"{}\"", d)).collect::<Vec<_>>().join(", ")
            )
        })
    })
}

fn directory_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

pub(super) fn package_lower_snake_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_package(ctx, |_, package| {
        (!package.split('.').all(is_lower_snake_case))
            .then(|| format!("Package name \"{}\" should be lower_snake.case", package))
    })
}

pub(super) fn package_version_suffix(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    if let Err(e) = VERSION_COMPONENT.as_ref() {
        return Err(RuleError::Internal(e.to_string()));
    }

    each_package(ctx, |_, package| {
        (!has_version_suffix(package)).then(|| {
            format!(
                "Package name \"{}\" should be suffixed with a correctly formed version, such as \"{}.v1\"",
                package, package
            )
        })
    })
}
