//! Service and RPC breaking rules

use super::{matched, removed, same_target};
use crate::rule::{BreakingContext, RuleError};
use protolith_core::Finding;
use protolith_image::{DeclDetail, DeclKind, Declaration, TypeRef};

pub(super) fn service_no_delete(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::Service)
        .into_iter()
        .map(|gone| {
            ctx.finding(
                &gone.location,
                &gone.before.location,
                format!(
                    "Previously present service \"{}\" was deleted from file \"{}\"",
                    gone.before.full_name, gone.before_file.path
                ),
            )
        })
        .collect())
}

pub(super) fn rpc_no_delete(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    Ok(removed(ctx, DeclKind::Method)
        .into_iter()
        .map(|gone| {
            ctx.finding(
                &gone.location,
                &gone.before.location,
                format!(
                    "Previously present RPC \"{}\" on service \"{}\" was deleted",
                    gone.before.name,
                    gone.after_parent.map(|p| p.full_name.as_str()).unwrap_or_default()
                ),
            )
        })
        .collect())
}

/// (input, output, client streaming, server streaming)
fn signature(method: &Declaration) -> Option<(&TypeRef, &TypeRef, bool, bool)> {
    match &method.detail {
        DeclDetail::Method {
            input,
            output,
            client_streaming,
            server_streaming,
        } => Some((input, output, *client_streaming, *server_streaming)),
        _ => None,
    }
}

fn same_message_type(
    ctx: &BreakingContext<'_>,
    side: &str,
    pick: fn(&Declaration) -> Option<&TypeRef>,
) -> Result<Vec<Finding>, RuleError> {
    let mut findings = Vec::new();
    for pair in matched(ctx, DeclKind::Method) {
        let (Some(before), Some(after)) = (pick(pair.before), pick(pair.after)) else {
            continue;
        };
        if same_target(ctx, before, after)? {
            continue;
        }
        findings.push(ctx.finding(
            &pair.after.location,
            &pair.before.location,
            format!(
                "RPC \"{}\" on service \"{}\" changed {} type from \"{}\" to \"{}\"",
                pair.after.name,
                pair.after_parent(),
                side,
                before.target.as_deref().unwrap_or(&before.name),
                after.target.as_deref().unwrap_or(&after.name)
            ),
        ));
    }
    Ok(findings)
}

pub(super) fn rpc_same_request_type(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    same_message_type(ctx, "request", |m| signature(m).map(|s| s.0))
}

pub(super) fn rpc_same_response_type(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    same_message_type(ctx, "response", |m| signature(m).map(|s| s.1))
}

pub(super) fn rpc_same_streaming(ctx: &BreakingContext<'_>) -> Result<Vec<Finding>, RuleError> {
    let mut findings = Vec::new();
    for pair in matched(ctx, DeclKind::Method) {
        let (Some(before), Some(after)) = (signature(pair.before), signature(pair.after)) else {
            continue;
        };

        for (direction, was, now) in [("client", before.2, after.2), ("server", before.3, after.3)] {
            if was != now {
                findings.push(ctx.finding(
                    &pair.after.location,
                    &pair.before.location,
                    format!(
                        "RPC \"{}\" on service \"{}\" changed {} streaming from {} to {}",
                        pair.after.name,
                        pair.after_parent(),
                        direction,
                        was,
                        now
                    ),
                ));
            }
        }
    }
    Ok(findings)
}
