//! Built-in lint rules
//!
//! ## Categories
//! - `MINIMAL` ⊂ `BASIC` ⊂ `DEFAULT`: package layout, naming and numbering
//! - `COMMENTS`: documentation on every public declaration
//! - `UNARY_RPC`: no streaming methods
//!
//! Rules only report on files of the workspace roots, never on dependencies.

mod comments;
mod imports;
mod naming;
mod numbering;
mod package;
mod services;

pub use naming::{is_lower_snake_case, is_pascal_case, is_upper_snake_case, to_upper_snake_case};
pub use package::has_version_suffix;

use crate::rule::{LintCheck, LintContext, LintRule, Rule, RuleError};
use protolith_core::{Finding, Severity};
use protolith_image::{DeclKind, Declaration, ImageFile};

pub const MINIMAL: &str = "MINIMAL";
pub const BASIC: &str = "BASIC";
pub const DEFAULT: &str = "DEFAULT";
pub const COMMENTS: &str = "COMMENTS";
pub const UNARY_RPC: &str = "UNARY_RPC";

pub const CATEGORIES: &[&str] = &[MINIMAL, BASIC, DEFAULT, COMMENTS, UNARY_RPC, crate::catalog::ALL];

const IN_MINIMAL: &[&str] = &[MINIMAL, BASIC, DEFAULT];
const IN_BASIC: &[&str] = &[BASIC, DEFAULT];
const IN_DEFAULT: &[&str] = &[DEFAULT];
const IN_COMMENTS: &[&str] = &[COMMENTS];
const IN_UNARY_RPC: &[&str] = &[UNARY_RPC];

fn rule(id: &'static str, purpose: &'static str, categories: &'static [&'static str], check: LintCheck) -> LintRule {
    let severity = if categories == IN_COMMENTS {
        Severity::Warn
    } else {
        Severity::Error
    };

    Rule {
        id,
        purpose,
        categories,
        severity,
        check,
    }
}

/// Every built-in lint rule
pub fn rules() -> Vec<LintRule> {
    vec![
        // Package layout
        rule("PACKAGE_DEFINED", "Files declare a package", IN_MINIMAL, package::package_defined),
        rule(
            "PACKAGE_DIRECTORY_MATCH",
            "Files live in the directory named by their package",
            IN_MINIMAL,
            package::package_directory_match,
        ),
        rule(
            "PACKAGE_SAME_DIRECTORY",
            "All files of a package live in one directory",
            IN_MINIMAL,
            package::package_same_directory,
        ),
        rule(
            "PACKAGE_LOWER_SNAKE_CASE",
            "Package components are lower_snake_case",
            IN_BASIC,
            package::package_lower_snake_case,
        ),
        rule(
            "PACKAGE_VERSION_SUFFIX",
            "Package names end in a version component such as v1 or v1beta1",
            IN_DEFAULT,
            package::package_version_suffix,
        ),
        // Imports
        rule("IMPORT_NO_CYCLE", "Files do not import each other in a cycle", IN_MINIMAL, imports::import_no_cycle),
        rule("IMPORT_NO_PUBLIC", "Imports are not public", IN_BASIC, imports::import_no_public),
        rule("IMPORT_USED", "Every import is used", IN_BASIC, imports::import_used),
        // Naming
        rule("MESSAGE_PASCAL_CASE", "Messages are PascalCase", IN_BASIC, naming::message_pascal_case),
        rule("FIELD_LOWER_SNAKE_CASE", "Fields are lower_snake_case", IN_BASIC, naming::field_lower_snake_case),
        rule("ONEOF_LOWER_SNAKE_CASE", "Oneofs are lower_snake_case", IN_BASIC, naming::oneof_lower_snake_case),
        rule("ENUM_PASCAL_CASE", "Enums are PascalCase", IN_BASIC, naming::enum_pascal_case),
        rule(
            "ENUM_VALUE_UPPER_SNAKE_CASE",
            "Enum values are UPPER_SNAKE_CASE",
            IN_BASIC,
            naming::enum_value_upper_snake_case,
        ),
        rule(
            "ENUM_VALUE_PREFIX",
            "Enum values are prefixed with the UPPER_SNAKE_CASE enum name",
            IN_DEFAULT,
            naming::enum_value_prefix,
        ),
        rule(
            "ENUM_ZERO_VALUE_SUFFIX",
            "The zero value of an enum ends in _UNSPECIFIED",
            IN_DEFAULT,
            naming::enum_zero_value_suffix,
        ),
        rule("SERVICE_PASCAL_CASE", "Services are PascalCase", IN_BASIC, naming::service_pascal_case),
        rule("RPC_PASCAL_CASE", "RPCs are PascalCase", IN_BASIC, naming::rpc_pascal_case),
        // Numbering
        rule(
            "ENUM_FIRST_VALUE_ZERO",
            "The first value of an enum is zero",
            IN_BASIC,
            numbering::enum_first_value_zero,
        ),
        rule("ENUM_NO_ALLOW_ALIAS", "Enums do not set allow_alias", IN_BASIC, numbering::enum_no_allow_alias),
        rule(
            "FIELD_NO_IMPLEMENTATION_RANGE",
            "Field numbers avoid the reserved implementation range 19000-19999",
            IN_BASIC,
            numbering::field_no_implementation_range,
        ),
        // Services
        rule("SERVICE_SUFFIX", "Service names end in Service", IN_DEFAULT, services::service_suffix),
        rule(
            "RPC_REQUEST_STANDARD_NAME",
            "RPC requests are named MethodRequest or ServiceMethodRequest",
            IN_DEFAULT,
            services::rpc_request_standard_name,
        ),
        rule(
            "RPC_RESPONSE_STANDARD_NAME",
            "RPC responses are named MethodResponse or ServiceMethodResponse",
            IN_DEFAULT,
            services::rpc_response_standard_name,
        ),
        rule(
            "RPC_NO_CLIENT_STREAMING",
            "RPCs do not stream requests",
            IN_UNARY_RPC,
            services::rpc_no_client_streaming,
        ),
        rule(
            "RPC_NO_SERVER_STREAMING",
            "RPCs do not stream responses",
            IN_UNARY_RPC,
            services::rpc_no_server_streaming,
        ),
        // Comments
        rule("COMMENT_MESSAGE", "Messages have a comment", IN_COMMENTS, comments::comment_message),
        rule("COMMENT_FIELD", "Fields have a comment", IN_COMMENTS, comments::comment_field),
        rule("COMMENT_ENUM", "Enums have a comment", IN_COMMENTS, comments::comment_enum),
        rule("COMMENT_SERVICE", "Services have a comment", IN_COMMENTS, comments::comment_service),
        rule("COMMENT_RPC", "RPCs have a comment", IN_COMMENTS, comments::comment_rpc),
    ]
}

/// Run `check` over every declaration of `kind` in the workspace files
fn each_declaration<F>(ctx: &LintContext<'_>, kind: DeclKind, mut check: F) -> Result<Vec<Finding>, RuleError>
where
    F: FnMut(&ImageFile, &Declaration) -> Result<Option<String>, RuleError>,
{
    let mut findings = Vec::new();
    for file in ctx.image.non_import_files() {
        for declaration in file.declarations_of(kind) {
            if let Some(message) = check(file, declaration)? {
                findings.push(ctx.finding(&declaration.location, message));
            }
        }
    }
    Ok(findings)
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Small images built straight from JSON syntax trees

    use protolith_core::{Digest, ModuleManifest, ModuleRef, SyntaxFile};
    use protolith_graph::ModuleGraph;
    use protolith_image::{build, DeclarationTree, FileId, Image};
    use std::collections::BTreeMap;

    /// Build a single-module image from `(path, syntax)` pairs
    pub fn image(files: &[(&str, serde_json::Value)]) -> Image {
        let module = ModuleRef::local("acme/test");
        let mut manifests = BTreeMap::new();
        manifests.insert(module.name.clone(), ModuleManifest::new(module.clone()));
        let graph = ModuleGraph::from_manifests(&[module.name.clone()], manifests, Vec::new()).unwrap();

        let trees = files
            .iter()
            .map(|(path, syntax)| {
                let bytes = serde_json::to_vec(syntax).unwrap();
                let parsed = SyntaxFile::from_json(&bytes).unwrap();
                let id = FileId::new(module.clone(), *path);
                (id.clone(), DeclarationTree::build(id, Digest::of(&bytes), &parsed))
            })
            .collect();

        build(&graph, trees).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn rule_ids_are_unique() {
        let rules = rules();
        let ids: BTreeSet<&str> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn comment_rules_warn() {
        for rule in rules() {
            let expected = if rule.categories.contains(&COMMENTS) {
                Severity::Warn
            } else {
                Severity::Error
            };
            assert_eq!(rule.severity, expected, "{}", rule.id);
        }
    }
}
