//! Service and RPC shape rules

use super::each_declaration;
use crate::rule::{LintContext, RuleError};
use protolith_core::Finding;
use protolith_image::{DeclDetail, DeclKind, Declaration, ImageFile, TypeRef};

pub(super) fn service_suffix(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, DeclKind::Service, |_, service| {
        Ok((!service.name.ends_with("Service"))
            .then(|| format!("Service name \"{}\" should be suffixed with \"Service\"", service.name)))
    })
}

#[derive(Clone, Copy)]
enum Side {
    Request,
    Response,
}

impl Side {
    fn suffix(self) -> &'static str {
        match self {
            Self::Request => "Request",
            Self::Response => "Response",
        }
    }

    fn pick(self, method: &Declaration) -> Option<&TypeRef> {
        match &method.detail {
            DeclDetail::Method { input, output, .. } => Some(match self {
                Self::Request => input,
                Self::Response => output,
            }),
            _ => None,
        }
    }
}

fn standard_name(ctx: &LintContext<'_>, side: Side) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, DeclKind::Method, |file, method| {
        let Some(reference) = side.pick(method) else {
            return Ok(None);
        };
        let (_, target) = ctx
            .image
            .resolve(reference)
            .ok_or_else(|| RuleError::DanglingReference(reference.name.clone()))?;

        let short = format!("{}{}", method.name, side.suffix());
        let long = format!("{}{}", service_name(file, method), short);
        if target.name == short || target.name == long {
            return Ok(None);
        }

        Ok(Some(format!(
            "RPC \"{}\" has {} type \"{}\" but should be \"{}\" or \"{}\"",
            method.name,
            side.suffix().to_lowercase(),
            target.full_name,
            short,
            long
        )))
    })
}

fn service_name<'f>(file: &'f ImageFile, method: &Declaration) -> &'f str {
    file.parent(method).map(|s| s.name.as_str()).unwrap_or_default()
}

pub(super) fn rpc_request_standard_name(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    standard_name(ctx, Side::Request)
}

pub(super) fn rpc_response_standard_name(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    standard_name(ctx, Side::Response)
}

fn streaming(method: &Declaration) -> (bool, bool) {
    match method.detail {
        DeclDetail::Method {
            client_streaming,
            server_streaming,
            ..
        } => (client_streaming, server_streaming),
        _ => (false, false),
    }
}

pub(super) fn rpc_no_client_streaming(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, DeclKind::Method, |_, method| {
        Ok(streaming(method)
            .0
            .then(|| format!("RPC \"{}\" is client streaming", method.name)))
    })
}

pub(super) fn rpc_no_server_streaming(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, DeclKind::Method, |_, method| {
        Ok(streaming(method)
            .1
            .then(|| format!("RPC \"{}\" is server streaming", method.name)))
    })
}
