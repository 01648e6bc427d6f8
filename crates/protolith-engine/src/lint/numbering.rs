//! Enum and field numbering rules

use super::each_declaration;
use crate::rule::{LintContext, RuleError};
use protolith_core::Finding;
use protolith_image::DeclKind;
use std::ops::RangeInclusive;

/// Field numbers the wire format reserves for its own implementation
pub const IMPLEMENTATION_RANGE: RangeInclusive<i32> = 19_000..=19_999;

pub(super) fn enum_first_value_zero(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    let mut findings = Vec::new();
    for file in ctx.image.non_import_files() {
        for (index, declaration) in file.declarations.iter().enumerate() {
            if declaration.kind != DeclKind::Enum {
                continue;
            }
            let first = file.children(index).find(|d| d.kind == DeclKind::EnumValue);
            if let Some(value) = first.filter(|v| v.number() != Some(0)) {
                findings.push(ctx.finding(
                    &value.location,
                    format!(
                        "First enum value \"{}\" should have a numeric value of 0",
                        value.name
                    ),
                ));
            }
        }
    }
    Ok(findings)
}

pub(super) fn enum_no_allow_alias(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, DeclKind::Enum, |_, e| {
        Ok((e.option("allow_alias") == Some("true"))
            .then(|| format!("Enum \"{}\" must not use option allow_alias", e.name)))
    })
}

pub(super) fn field_no_implementation_range(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    let mut findings = each_declaration(ctx, DeclKind::Field, |_, field| {
        Ok(in_implementation_range(field.number(), &field.name))
    })?;
    findings.extend(each_declaration(ctx, DeclKind::Extension, |_, field| {
        Ok(in_implementation_range(field.number(), &field.name))
    })?);
    Ok(findings)
}

fn in_implementation_range(number: Option<i32>, name: &str) -> Option<String> {
    number.filter(|n| IMPLEMENTATION_RANGE.contains(n)).map(|n| {
        format!(
            "Field \"{}\" uses number {}, which is reserved for the implementation ({}-{})",
            name,
            n,
            IMPLEMENTATION_RANGE.start(),
            IMPLEMENTATION_RANGE.end()
        )
    })
}
