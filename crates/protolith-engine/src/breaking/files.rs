//! File-level breaking rules

use crate::rule::{BreakingContext, RuleError};
use protolith_core::{Finding, Location};

pub(super) fn file_no_delete(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    let after = ctx.after.image();

    Ok(ctx
        .before
        .image()
        .non_import_files()
        .filter(|f| after.file(&f.path).is_none())
        .map(|f| {
            ctx.finding(
                &Location::new(f.path.clone()),
                &f.location(),
                format!("Previously present file \"{}\" was deleted", f.path),
            )
        })
        .collect())
}

pub(super) fn file_same_package(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    let after = ctx.after.image();
    let shown = |p: &Option<String>| p.clone().unwrap_or_else(|| "<none>".to_string());

    let mut findings = Vec::new();
    for before in ctx.before.image().non_import_files() {
        let Some(current) = after.file(&before.path) else {
            continue;
        };
        if before.package == current.package {
            continue;
        }

        let location = current.package_location.clone().unwrap_or_else(|| current.location());
        let against = before.package_location.clone().unwrap_or_else(|| before.location());
        findings.push(ctx.finding(
            &location,
            &against,
            format!(
                "File \"{}\" changed package from \"{}\" to \"{}\"",
                before.path,
                shown(&before.package),
                shown(&current.package)
            ),
        ));
    }
    Ok(findings)
}
