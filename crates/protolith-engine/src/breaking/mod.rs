//! Built-in breaking change rules
//!
//! Declarations of the old and new image are matched by file path plus
//! structural path, never by name. A declaration whose path is gone was
//! deleted; one whose path survives under another name was renamed.
//!
//! ## Categories
//! - `FILE`: source compatibility, so renames break generated code
//! - `WIRE`: wire compatibility, renames are tolerated
//!
//! Deletions are reported on the nearest surviving parent in the new image,
//! and only when that parent still exists: deleting a message reports the
//! message, not each of its fields.

mod enums;
mod files;
mod messages;
mod services;

use crate::cache::RunCache;
use crate::rule::{BreakingCheck, BreakingContext, BreakingRule, Rule, RuleError};
use protolith_core::{Location, Severity};
use protolith_image::{DeclKind, Declaration, FieldType, ImageFile, TypeRef};

pub const FILE: &str = "FILE";
pub const WIRE: &str = "WIRE";

pub const CATEGORIES: &[&str] = &[FILE, WIRE, crate::catalog::ALL];

const IN_FILE: &[&str] = &[FILE];
const IN_WIRE: &[&str] = &[WIRE];
const IN_BOTH: &[&str] = &[FILE, WIRE];

fn rule(id: &'static str, purpose: &'static str, categories: &'static [&'static str], check: BreakingCheck) -> BreakingRule {
    Rule {
        id,
        purpose,
        categories,
        severity: Severity::Error,
        check,
    }
}

/// Every built-in breaking rule
pub fn rules() -> Vec<BreakingRule> {
    vec![
        // Files
        rule("FILE_NO_DELETE", "Files are not deleted", IN_FILE, files::file_no_delete),
        rule("FILE_SAME_PACKAGE", "Files keep their package", IN_FILE, files::file_same_package),
        // Messages and fields
        rule("MESSAGE_NO_DELETE", "Messages are not deleted", IN_FILE, messages::message_no_delete),
        rule("MESSAGE_SAME_NAME", "Messages are not renamed", IN_FILE, messages::message_same_name),
        rule("FIELD_NO_DELETE", "Fields are not deleted", IN_FILE, messages::field_no_delete),
        rule(
            "FIELD_NO_DELETE_UNLESS_NUMBER_RESERVED",
            "Fields are not deleted unless their number is reserved",
            IN_WIRE,
            messages::field_no_delete_unless_number_reserved,
        ),
        rule("FIELD_SAME_NAME", "Fields are not renamed", IN_FILE, messages::field_same_name),
        rule("FIELD_SAME_NUMBER", "Fields keep their number", IN_BOTH, messages::field_same_number),
        rule("FIELD_SAME_TYPE", "Fields keep their type", IN_BOTH, messages::field_same_type),
        rule("FIELD_SAME_LABEL", "Fields keep their label", IN_BOTH, messages::field_same_label),
        rule("FIELD_SAME_ONEOF", "Fields stay in the same oneof", IN_BOTH, messages::field_same_oneof),
        // Enums
        rule("ENUM_NO_DELETE", "Enums are not deleted", IN_FILE, enums::enum_no_delete),
        rule("ENUM_VALUE_NO_DELETE", "Enum values are not deleted", IN_FILE, enums::enum_value_no_delete),
        rule(
            "ENUM_VALUE_NO_DELETE_UNLESS_NUMBER_RESERVED",
            "Enum values are not deleted unless their number is reserved",
            IN_WIRE,
            enums::enum_value_no_delete_unless_number_reserved,
        ),
        rule("ENUM_VALUE_SAME_NAME", "Enum values are not renamed", IN_FILE, enums::enum_value_same_name),
        rule("ENUM_VALUE_SAME_NUMBER", "Enum values keep their number", IN_BOTH, enums::enum_value_same_number),
        // Services
        rule("SERVICE_NO_DELETE", "Services are not deleted", IN_FILE, services::service_no_delete),
        rule("RPC_NO_DELETE", "RPCs are not deleted", IN_FILE, services::rpc_no_delete),
        rule(
            "RPC_SAME_REQUEST_TYPE",
            "RPCs keep their request type",
            IN_BOTH,
            services::rpc_same_request_type,
        ),
        rule(
            "RPC_SAME_RESPONSE_TYPE",
            "RPCs keep their response type",
            IN_BOTH,
            services::rpc_same_response_type,
        ),
        rule(
            "RPC_SAME_STREAMING",
            "RPCs keep their streaming directions",
            IN_BOTH,
            services::rpc_same_streaming,
        ),
    ]
}

/// A declaration of the old image and its counterpart in the new one
struct Matched<'a> {
    before_file: &'a ImageFile,
    before: &'a Declaration,
    after_file: &'a ImageFile,
    after: &'a Declaration,
}

impl Matched<'_> {
    /// Full name of the enclosing declaration in the new image
    fn after_parent(&self) -> &str {
        self.after_file
            .parent(self.after)
            .map(|p| p.full_name.as_str())
            .unwrap_or_default()
    }
}

/// A declaration of the old image with no counterpart in the new one
struct Removed<'a> {
    before_file: &'a ImageFile,
    before: &'a Declaration,

    /// Surviving parent in the new image, if the declaration had one
    after_parent: Option<&'a Declaration>,

    /// Where to report the deletion in the new image
    location: Location,
}

/// Declaration at the same file and path in `cache`, if it is still a `kind`
fn counterpart<'a>(cache: &'a RunCache, file: &str, declaration: &Declaration) -> Option<(&'a ImageFile, &'a Declaration)> {
    cache
        .at_path(file, &declaration.path)
        .map(|handle| cache.image().get(handle))
        .filter(|(_, d)| d.kind == declaration.kind)
}

fn matched<'a>(ctx: &BreakingContext<'a>, kind: DeclKind) -> Vec<Matched<'a>> {
    let (before, after) = (ctx.before, ctx.after);

    let mut pairs = Vec::new();
    for before_file in before.image().non_import_files() {
        for declaration in before_file.declarations_of(kind) {
            if let Some((after_file, after_declaration)) = counterpart(after, &before_file.path, declaration) {
                pairs.push(Matched {
                    before_file,
                    before: declaration,
                    after_file,
                    after: after_declaration,
                });
            }
        }
    }
    pairs
}

fn removed<'a>(ctx: &BreakingContext<'a>, kind: DeclKind) -> Vec<Removed<'a>> {
    let (before, after) = (ctx.before, ctx.after);

    let mut gone = Vec::new();
    for before_file in before.image().non_import_files() {
        // Declarations of deleted files are covered by FILE_NO_DELETE
        let Some(after_file) = after.image().file(&before_file.path) else {
            continue;
        };

        for declaration in before_file.declarations_of(kind) {
            if counterpart(after, &before_file.path, declaration).is_some() {
                continue;
            }

            let (after_parent, location) = match before_file.parent(declaration) {
                Some(parent) => match counterpart(after, &before_file.path, parent) {
                    Some((_, surviving)) => (Some(surviving), surviving.location.clone()),
                    None => continue,
                },
                None => (None, after_file.location()),
            };

            gone.push(Removed {
                before_file,
                before: declaration,
                after_parent,
                location,
            });
        }
    }
    gone
}

/// Structural identity of the declaration a reference is bound to
fn target_identity(cache: &RunCache, reference: &TypeRef) -> Result<(String, protolith_image::DeclPath), RuleError> {
    cache
        .image()
        .resolve(reference)
        .map(|(file, declaration)| (file.path.clone(), declaration.path.clone()))
        .ok_or_else(|| RuleError::DanglingReference(reference.name.clone()))
}

fn same_target(ctx: &BreakingContext<'_>, before: &TypeRef, after: &TypeRef) -> Result<bool, RuleError> {
    Ok(target_identity(ctx.before, before)? == target_identity(ctx.after, after)?)
}

/// Scalars by equality, named types by the identity of their targets
fn same_type(ctx: &BreakingContext<'_>, before: &FieldType, after: &FieldType) -> Result<bool, RuleError> {
    match (before, after) {
        (FieldType::Scalar { scalar: a }, FieldType::Scalar { scalar: b }) => Ok(a == b),
        (FieldType::Named { reference: a }, FieldType::Named { reference: b }) => same_target(ctx, a, b),
        (FieldType::Map { key: ka, value: va }, FieldType::Map { key: kb, value: vb }) => {
            Ok(ka == kb && same_type(ctx, va, vb)?)
        }
        _ => Ok(false),
    }
}
