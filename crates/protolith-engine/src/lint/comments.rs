//! Documentation rules

use super::each_declaration;
use crate::rule::{LintContext, RuleError};
use protolith_core::Finding;
use protolith_image::DeclKind;

fn has_comment(ctx: &LintContext<'_>, kind: DeclKind, label: &'static str) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, kind, |_, d| {
        Ok(d.comment
            .is_none()
            .then(|| format!("{} \"{}\" should have a non-empty comment for documentation", label, d.name)))
    })
}

pub(super) fn comment_message(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    has_comment(ctx, DeclKind::Message, "Message")
}

pub(super) fn comment_field(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    has_comment(ctx, DeclKind::Field, "Field")
}

pub(super) fn comment_enum(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    has_comment(ctx, DeclKind::Enum, "Enum")
}

pub(super) fn comment_service(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    has_comment(ctx, DeclKind::Service, "Service")
}

pub(super) fn comment_rpc(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    has_comment(ctx, DeclKind::Method, "RPC")
}
