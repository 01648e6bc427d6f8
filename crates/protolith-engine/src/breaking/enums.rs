//! Enum breaking rules

use super::messages::number_reserved;
use super::{matched, removed, Removed};
use crate::rule::{BreakingContext, RuleError};
use protolith_core::Finding;
use protolith_image::DeclKind;

pub(super) fn enum_no_delete(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::Enum)
        .into_iter()
        .map(|gone| {
            ctx.finding(
                &gone.location,
                &gone.before.location,
                format!(
                    "Previously present enum \"{}\" was deleted from file \"{}\"",
                    gone.before.full_name, gone.before_file.path
                ),
            )
        })
        .collect())
}

fn deleted_value_message(gone: &Removed<'_>) -> String {
    format!(
        "Previously present enum value \"{}\" with name \"{}\" on enum \"{}\" was deleted",
        gone.before.number().unwrap_or_default(),
        gone.before.name,
        gone.after_parent.map(|p| p.full_name.as_str()).unwrap_or_default()
    )
}

pub(super) fn enum_value_no_delete(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::EnumValue)
        .into_iter()
        .map(|gone| ctx.finding(&gone.location, &gone.before.location, deleted_value_message(&gone)))
        .collect())
}

pub(super) fn enum_value_no_delete_unless_number_reserved(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::EnumValue)
        .into_iter()
        .filter(|gone| !number_reserved(gone))
        .map(|gone| {
            ctx.finding(
                &gone.location,
                &gone.before.location,
                format!("{} without reserving the number", deleted_value_message(&gone)),
            )
        })
        .collect())
}

pub(super) fn enum_value_same_name(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(matched(ctx, DeclKind::EnumValue)
        .into_iter()
        .filter(|pair| pair.before.name != pair.after.name)
        .map(|pair| {
            ctx.finding(
                &pair.after.location,
                &pair.before.location,
                format!(
                    "Enum value \"{}\" on enum \"{}\" changed name from \"{}\" to \"{}\"",
                    pair.before.number().unwrap_or_default(),
                    pair.after_parent(),
                    pair.before.name,
                    pair.after.name
                ),
            )
        })
        .collect())
}

pub(super) fn enum_value_same_number(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(matched(ctx, DeclKind::EnumValue)
        .into_iter()
        .filter(|pair| pair.before.number() != pair.after.number())
        .map(|pair| {
            ctx.finding(
                &pair.after.location,
                &pair.before.location,
                format!(
                    "Enum value \"{}\" on enum \"{}\" changed number from {} to {}",
                    pair.after.name,
                    pair.after_parent(),
                    pair.before.number().unwrap_or_default(),
                    pair.after.number().unwrap_or_default()
                ),
            )
        })
        .collect())
}
