//! Message and field breaking rules

use super::{matched, removed, same_type, Matched, Removed};
use crate::rule::{BreakingContext, RuleError};
use protolith_core::{Finding, Label};
use protolith_image::{DeclDetail, DeclKind, Declaration, FieldType, ImageFile};

pub(super) fn message_no_delete(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::Message)
        .into_iter()
        .map(|gone| {
            ctx.finding(
                &gone.location,
                &gone.before.location,
                format!(
                    "Previously present message \"{}\" was deleted from file \"{}\"",
                    gone.before.full_name, gone.before_file.path
                ),
            )
        })
        .collect())
}

pub(super) fn message_same_name(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(matched(ctx, DeclKind::Message)
        .into_iter()
        .filter(|pair| pair.before.name != pair.after.name)
        .map(|pair| {
            ctx.finding(
                &pair.after.location,
                &pair.before.location,
                format!(
                    "Message \"{}\" was renamed to \"{}\"",
                    pair.before.full_name, pair.after.full_name
                ),
            )
        })
        .collect())
}

/// Field attributes the rules compare
struct FieldView<'a> {
    number: i32,
    label: Label,
    ty: &'a FieldType,
    oneof: Option<usize>,
}

fn field_view(declaration: &Declaration) -> Option<FieldView<'_>> {
    match &declaration.detail {
        DeclDetail::Field {
            number,
            label,
            ty,
            oneof,
            ..
        } => Some(FieldView {
            number: *number,
            label: *label,
            ty,
            oneof: *oneof,
        }),
        _ => None,
    }
}

fn describe(pair: &Matched<'_>, before: &FieldView<'_>) -> String {
    format!(
        "Field \"{}\" with name \"{}\" on message \"{}\"",
        before.number,
        pair.after.name,
        pair.after_parent()
    )
}

/// Run `check` over every field present in both images
fn each_field_pair<F>(ctx: &BreakingContext<'_>, mut check: F) -> Result<Vec<Finding>, RuleError>
where
    F: FnMut(&Matched<'_>, &FieldView<'_>, &FieldView<'_>) -> Result<Option<String>, RuleError>,
{
    let mut findings = Vec::new();
    for pair in matched(ctx, DeclKind::Field) {
        let (Some(before), Some(after)) = (field_view(pair.before), field_view(pair.after)) else {
            continue;
        };
        if let Some(message) = check(&pair, &before, &after)? {
            findings.push(ctx.finding(&pair.after.location, &pair.before.location, message));
        }
    }
    Ok(findings)
}

fn deleted_field_message(gone: &Removed<'_>) -> String {
    format!(
        "Previously present field \"{}\" with name \"{}\" on message \"{}\" was deleted",
        gone.before.number().unwrap_or_default(),
        gone.before.name,
        gone.after_parent.map(|p| p.full_name.as_str()).unwrap_or_default()
    )
}

pub(super) fn field_no_delete(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::Field)
        .into_iter()
        .map(|gone| ctx.finding(&gone.location, &gone.before.location, deleted_field_message(&gone)))
        .collect())
}

/// Whether the surviving parent reserves the number of a deleted child
pub(super) fn number_reserved(gone: &Removed<'_>) -> bool {
    let Some(number) = gone.before.number() else {
        return false;
    };
    gone.after_parent
        .and_then(|parent| parent.reserved())
        .map(|(ranges, _)| ranges.iter().any(|r| r.contains(number)))
        .unwrap_or(false)
}

pub(super) fn field_no_delete_unless_number_reserved(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::Field)
        .into_iter()
        .filter(|gone| !number_reserved(gone))
        .map(|gone| {
            ctx.finding(
                &gone.location,
                &gone.before.location,
                format!("{} without reserving the number", deleted_field_message(&gone)),
            )
        })
        .collect())
}

pub(super) fn field_same_name(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_field_pair(ctx, |pair, before, _| {
        Ok((pair.before.name != pair.after.name).then(|| {
            format!(
                "Field \"{}\" on message \"{}\" changed name from \"{}\" to \"{}\"",
                before.number,
                pair.after_parent(),
                pair.before.name,
                pair.after.name
            )
        }))
    })
}

pub(super) fn field_same_number(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_field_pair(ctx, |pair, before, after| {
        Ok((before.number != after.number).then(|| {
            format!(
                "Field with name \"{}\" on message \"{}\" changed number from {} to {}",
                pair.after.name,
                pair.after_parent(),
                before.number,
                after.number
            )
        }))
    })
}

pub(super) fn field_same_type(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_field_pair(ctx, |pair, before, after| {
        if same_type(ctx, before.ty, after.ty)? {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} changed type from \"{}\" to \"{}\"",
            describe(pair, before),
            before.ty,
            after.ty
        )))
    })
}

pub(super) fn field_same_label(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_field_pair(ctx, |pair, before, after| {
        Ok((before.label != after.label).then(|| {
            format!(
                "{} changed label from \"{}\" to \"{}\"",
                describe(pair, before),
                before.label,
                after.label
            )
        }))
    })
}

/// Name of the `index`th oneof of the message enclosing `field`
fn oneof_name<'f>(file: &'f ImageFile, field: &Declaration, index: Option<usize>) -> &'f str {
    let found = index.zip(field.parent).and_then(|(i, parent)| {
        file.children(parent)
            .filter(|d| d.kind == DeclKind::Oneof)
            .nth(i)
    });
    found.map(|d| d.name.as_str()).unwrap_or("<none>")
}

pub(super) fn field_same_oneof(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    // Oneofs are matched by position like everything else, so a renamed oneof is not a move
    each_field_pair(ctx, |pair, before, after| {
        if before.oneof == after.oneof {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} moved from oneof \"{}\" to \"{}\"",
            describe(pair, before),
            oneof_name(pair.before_file, pair.before, before.oneof),
            oneof_name(pair.after_file, pair.after, after.oneof)
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::fixture;
    use crate::RunCache;
    use protolith_core::Severity;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn field_moved_into_a_oneof() {
        let message = |oneof: serde_json::Value| {
            json!({
                "package": "acme.v1",
                "messages": [{
                    "name": "Payment",
                    "oneofs": [{ "name": "method" }],
                    "fields": [{ "name": "card", "number": 1, "oneof": oneof, "type": { "kind": "scalar", "scalar": "string" } }],
                }],
            })
        };
        let before = RunCache::new(Arc::new(fixture::image(&[("acme/v1/p.proto", message(json!(null)))])));
        let after = RunCache::new(Arc::new(fixture::image(&[("acme/v1/p.proto", message(json!(0)))])));

        let findings = field_same_oneof(&BreakingContext::new(&before, &after, "FIELD_SAME_ONEOF", Severity::Error)).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Field \"1\" with name \"card\" on message \"acme.v1.Payment\" moved from oneof \"<none>\" to \"method\""
        );
    }
}
