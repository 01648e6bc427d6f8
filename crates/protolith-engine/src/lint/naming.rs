//! Naming convention rules

use super::each_declaration;
use crate::rule::{LintContext, RuleError};
use protolith_core::Finding;
use protolith_image::{DeclKind, Declaration, ImageFile};

/// `lower_snake_case`: lowercase words joined by single underscores
pub fn is_lower_snake_case(name: &str) -> bool {
    is_snake_case(name, |c| c.is_ascii_lowercase())
}

/// `UPPER_SNAKE_CASE`: uppercase words joined by single underscores
pub fn is_upper_snake_case(name: &str) -> bool {
    is_snake_case(name, |c| c.is_ascii_uppercase())
}

fn is_snake_case(name: &str, letter: impl Fn(char) -> bool) -> bool {
    name.chars().next().map(&letter).unwrap_or(false)
        && !name.ends_with('_')
        && !name.contains("__")
        && name.chars().all(|c| letter(c) || c.is_ascii_digit() || c == '_')
}

/// `PascalCase`: leading uppercase letter, letters and digits only
///
/// Acronyms are not split, so all-caps names such as `URL` pass.
pub fn is_pascal_case(name: &str) -> bool {
    name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `FooBar` -> `FOO_BAR`, `HTTPStatus` -> `HTTP_STATUS`
pub fn to_upper_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).map(|n| n.is_ascii_lowercase()).unwrap_or(false);
            if prev != '_' && (prev.is_ascii_lowercase() || prev.is_ascii_digit() || next_lower) {
                out.push('_');
            }
        }
        out.push(c.to_ascii_uppercase());
    }

    out
}

fn case_check(
    ctx: &LintContext<'_>,
    kind: DeclKind,
    valid: fn(&str) -> bool,
    style: &'static str,
) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, kind, |_, d| {
        Ok((!valid(&d.name)).then(|| format!("{} name \"{}\" should be {}", capitalized(kind), d.name, style)))
    })
}

fn capitalized(kind: DeclKind) -> String {
    let name = kind.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

pub(super) fn message_pascal_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    case_check(ctx, DeclKind::Message, is_pascal_case, "PascalCase")
}

pub(super) fn field_lower_snake_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    case_check(ctx, DeclKind::Field, is_lower_snake_case, "lower_snake_case")
}

pub(super) fn oneof_lower_snake_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    case_check(ctx, DeclKind::Oneof, is_lower_snake_case, "lower_snake_case")
}

pub(super) fn enum_pascal_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    case_check(ctx, DeclKind::Enum, is_pascal_case, "PascalCase")
}

pub(super) fn enum_value_upper_snake_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    case_check(ctx, DeclKind::EnumValue, is_upper_snake_case, "UPPER_SNAKE_CASE")
}

pub(super) fn service_pascal_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    case_check(ctx, DeclKind::Service, is_pascal_case, "PascalCase")
}

pub(super) fn rpc_pascal_case(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    case_check(ctx, DeclKind::Method, is_pascal_case, "PascalCase")
}

fn enum_of<'f>(file: &'f ImageFile, value: &Declaration) -> Result<&'f Declaration, RuleError> {
    file.parent(value)
        .ok_or_else(|| RuleError::Internal(format!("enum value {} has no enum", value.full_name)))
}

pub(super) fn enum_value_prefix(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, DeclKind::EnumValue, |file, value| {
        let prefix = format!("{}_", to_upper_snake_case(&enum_of(file, value)?.name));
        Ok((!value.name.starts_with(&prefix))
            .then(|| format!("Enum value name \"{}\" should be prefixed with \"{}\"", value.name, prefix)))
    })
}

pub(super) fn enum_zero_value_suffix(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
    each_declaration(ctx, DeclKind::EnumValue, |_, value| {
        Ok((value.number() == Some(0) && !value.name.ends_with("_UNSPECIFIED"))
            .then(|| format!("Enum zero value name \"{}\" should be suffixed with \"_UNSPECIFIED\"", value.name)))
    })
}
