//! Declaration trees
//!
//! Turns one file's syntax tree into a flat arena of declarations, each
//! tagged with its module, source location, fully-qualified name and
//! structural path. Type references stay unresolved until the image builder
//! binds them.

use crate::path::*;
use protolith_core::syntax::{
    ReservedRange, SyntaxEnum, SyntaxField, SyntaxFile, SyntaxMessage, SyntaxOption, SyntaxService, SyntaxType,
};
use protolith_core::{Digest, Label, Location, ModuleRef, Scalar, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a file: owning module plus module-relative path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId {
    pub module: ModuleRef,
    pub path: String,
}

impl FileId {
    pub fn new(module: ModuleRef, path: impl Into<String>) -> Self {
        Self {
            module,
            path: path.into(),
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Message,
    Field,
    Oneof,
    Enum,
    EnumValue,
    Service,
    Method,
    Extension,
}

impl DeclKind {
    /// Kinds a field type may name
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Message | Self::Enum)
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Message => "message",
            Self::Field => "field",
            Self::Oneof => "oneof",
            Self::Enum => "enum",
            Self::EnumValue => "enum value",
            Self::Service => "service",
            Self::Method => "rpc",
            Self::Extension => "extension",
        };
        f.write_str(name)
    }
}

/// A type name as written, plus the fully-qualified name it was bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl TypeRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldType {
    Scalar { scalar: Scalar },
    Named { reference: TypeRef },
    Map { key: Scalar, value: Box<FieldType> },
}

impl FieldType {
    fn from_syntax(ty: &SyntaxType) -> Self {
        match ty {
            SyntaxType::Scalar { scalar } => Self::Scalar { scalar: *scalar },
            SyntaxType::Named { name } => Self::Named {
                reference: TypeRef::unresolved(name.clone()),
            },
            SyntaxType::Map { key, value } => Self::Map {
                key: *key,
                value: Box::new(Self::from_syntax(value)),
            },
        }
    }

    /// Every named reference inside this type
    pub fn references(&self) -> Vec<&TypeRef> {
        match self {
            Self::Scalar { .. } => Vec::new(),
            Self::Named { reference } => vec![reference],
            Self::Map { value, .. } => value.references(),
        }
    }

    pub fn references_mut(&mut self) -> Vec<&mut TypeRef> {
        match self {
            Self::Scalar { .. } => Vec::new(),
            Self::Named { reference } => vec![reference],
            Self::Map { value, .. } => value.references_mut(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { scalar } => write!(f, "{}", scalar),
            Self::Named { reference } => match &reference.target {
                Some(target) => write!(f, "{}", target),
                None => write!(f, "{}", reference.name),
            },
            Self::Map { key, value } => write!(f, "map<{}, {}>", key, value),
        }
    }
}

/// `option name = value;` attached to a declaration or file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionAssignment {
    pub name: String,
    pub value: String,
    pub path: DeclPath,
    pub location: Location,
}

/// Kind-specific attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclDetail {
    Message {
        reserved: Vec<ReservedRange>,
        reserved_names: Vec<String>,
    },
    Field {
        number: i32,
        label: Label,
        #[serde(rename = "type")]
        ty: FieldType,
        /// Index of the enclosing message's oneof
        oneof: Option<usize>,
        /// Message being extended, for extensions
        extendee: Option<TypeRef>,
    },
    Oneof,
    Enum {
        reserved: Vec<ReservedRange>,
        reserved_names: Vec<String>,
    },
    EnumValue {
        number: i32,
    },
    Service,
    Method {
        input: TypeRef,
        output: TypeRef,
        client_streaming: bool,
        server_streaming: bool,
    },
}

/// One node of a declaration tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    pub full_name: String,

    /// Cross-version identity within the file
    pub path: DeclPath,

    /// Arena index of the enclosing declaration
    pub parent: Option<usize>,

    pub location: Location,
    pub span: Span,
    pub comment: Option<String>,
    pub options: Vec<OptionAssignment>,
    pub detail: DeclDetail,
}

impl Declaration {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.iter().find(|o| o.name == name).map(|o| o.value.as_str())
    }

    /// Field or enum value number
    pub fn number(&self) -> Option<i32> {
        match &self.detail {
            DeclDetail::Field { number, .. } | DeclDetail::EnumValue { number } => Some(*number),
            _ => None,
        }
    }

    /// Type references this declaration carries
    pub fn references(&self) -> Vec<&TypeRef> {
        match &self.detail {
            DeclDetail::Field { ty, extendee, .. } => {
                let mut refs = ty.references();
                refs.extend(extendee.iter());
                refs
            }
            DeclDetail::Method { input, output, .. } => vec![input, output],
            _ => Vec::new(),
        }
    }

    /// Same order as [`Declaration::references`]
    pub fn references_mut(&mut self) -> Vec<&mut TypeRef> {
        match &mut self.detail {
            DeclDetail::Field { ty, extendee, .. } => {
                let mut refs = ty.references_mut();
                refs.extend(extendee.iter_mut());
                refs
            }
            DeclDetail::Method { input, output, .. } => vec![input, output],
            _ => Vec::new(),
        }
    }

    /// Reserved ranges and names, for messages and enums
    pub fn reserved(&self) -> Option<(&[ReservedRange], &[String])> {
        match &self.detail {
            DeclDetail::Message { reserved, reserved_names } | DeclDetail::Enum { reserved, reserved_names } => {
                Some((reserved, reserved_names))
            }
            _ => None,
        }
    }
}

/// `import` statement of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub path: String,
    pub public: bool,
    pub weak: bool,
    pub location: Location,
}

/// Annotated declarations of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationTree {
    pub file: FileId,
    pub digest: Digest,
    pub package: Option<String>,
    pub package_location: Option<Location>,
    pub imports: Vec<Import>,
    pub options: Vec<OptionAssignment>,

    /// Declarations in pre-order
    pub declarations: Vec<Declaration>,
}

impl DeclarationTree {
    /// Build the tree of one parsed file
    pub fn build(file: FileId, digest: Digest, syntax: &SyntaxFile) -> Self {
        let mut builder = TreeBuilder {
            path: file.path.clone(),
            declarations: Vec::new(),
        };

        let package = syntax.package.clone().filter(|p| !p.is_empty());
        let scope = package.clone().unwrap_or_default();
        let root = DeclPath::root();

        for (i, message) in syntax.messages.iter().enumerate() {
            builder.message(message, &scope, root.child(FILE_MESSAGE, i), None);
        }
        for (i, en) in syntax.enums.iter().enumerate() {
            builder.enumeration(en, &scope, root.child(FILE_ENUM, i), None);
        }
        for (i, service) in syntax.services.iter().enumerate() {
            builder.service(service, &scope, root.child(FILE_SERVICE, i));
        }
        for (i, extension) in syntax.extensions.iter().enumerate() {
            builder.field(extension, &scope, root.child(FILE_EXTENSION, i), None, DeclKind::Extension);
        }

        let imports = syntax
            .imports
            .iter()
            .map(|import| Import {
                path: protolith_source::normalize_path(&import.path),
                public: import.public,
                weak: import.weak,
                location: builder.location(&import.span),
            })
            .collect();

        Self {
            package_location: package.as_ref().map(|_| builder.location(&syntax.package_span)),
            package,
            imports,
            options: builder.options(&syntax.options, &root, FILE_OPTION),
            declarations: builder.declarations,
            digest,
            file,
        }
    }
}

struct TreeBuilder {
    path: String,
    declarations: Vec<Declaration>,
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

impl TreeBuilder {
    fn location(&self, span: &Span) -> Location {
        Location::from_span(self.path.clone(), span)
    }

    fn options(&self, options: &[SyntaxOption], owner: &DeclPath, tag: u32) -> Vec<OptionAssignment> {
        options
            .iter()
            .enumerate()
            .map(|(i, option)| OptionAssignment {
                name: option.name.clone(),
                value: option.value.clone(),
                path: owner.child(tag, i),
                location: self.location(&option.span),
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        kind: DeclKind,
        name: &str,
        full_name: String,
        path: DeclPath,
        parent: Option<usize>,
        span: &Span,
        comment: &Option<String>,
        options: Vec<OptionAssignment>,
        detail: DeclDetail,
    ) -> usize {
        self.declarations.push(Declaration {
            kind,
            name: name.to_string(),
            full_name,
            path,
            parent,
            location: self.location(span),
            span: *span,
            comment: comment.clone().filter(|c| !c.trim().is_empty()),
            options,
            detail,
        });
        self.declarations.len() - 1
    }

    fn message(&mut self, message: &SyntaxMessage, scope: &str, path: DeclPath, parent: Option<usize>) {
        let full_name = qualify(scope, &message.name);
        let options = self.options(&message.options, &path, MESSAGE_OPTION);
        let index = self.push(
            DeclKind::Message,
            &message.name,
            full_name.clone(),
            path.clone(),
            parent,
            &message.span,
            &message.comment,
            options,
            DeclDetail::Message {
                reserved: message.reserved.clone(),
                reserved_names: message.reserved_names.clone(),
            },
        );

        for (i, field) in message.fields.iter().enumerate() {
            let kind = if field.extendee.is_some() {
                DeclKind::Extension
            } else {
                DeclKind::Field
            };
            self.field(field, &full_name, path.child(MESSAGE_FIELD, i), Some(index), kind);
        }
        for (i, oneof) in message.oneofs.iter().enumerate() {
            self.push(
                DeclKind::Oneof,
                &oneof.name,
                qualify(&full_name, &oneof.name),
                path.child(MESSAGE_ONEOF, i),
                Some(index),
                &oneof.span,
                &oneof.comment,
                Vec::new(),
                DeclDetail::Oneof,
            );
        }
        for (i, nested) in message.messages.iter().enumerate() {
            self.message(nested, &full_name, path.child(MESSAGE_NESTED, i), Some(index));
        }
        for (i, en) in message.enums.iter().enumerate() {
            self.enumeration(en, &full_name, path.child(MESSAGE_ENUM, i), Some(index));
        }
    }

    fn field(&mut self, field: &SyntaxField, scope: &str, path: DeclPath, parent: Option<usize>, kind: DeclKind) {
        let options = self.options(&field.options, &path, FIELD_OPTION);
        self.push(
            kind,
            &field.name,
            qualify(scope, &field.name),
            path,
            parent,
            &field.span,
            &field.comment,
            options,
            DeclDetail::Field {
                number: field.number,
                label: field.label,
                ty: FieldType::from_syntax(&field.ty),
                oneof: field.oneof,
                extendee: field.extendee.clone().map(TypeRef::unresolved),
            },
        );
    }

    fn enumeration(&mut self, en: &SyntaxEnum, scope: &str, path: DeclPath, parent: Option<usize>) {
        let options = self.options(&en.options, &path, ENUM_OPTION);
        let index = self.push(
            DeclKind::Enum,
            &en.name,
            qualify(scope, &en.name),
            path.clone(),
            parent,
            &en.span,
            &en.comment,
            options,
            DeclDetail::Enum {
                reserved: en.reserved.clone(),
                reserved_names: en.reserved_names.clone(),
            },
        );

        // Enum values are scoped as siblings of their enum
        for (i, value) in en.values.iter().enumerate() {
            let value_path = path.child(ENUM_VALUE, i);
            let options = self.options(&value.options, &value_path, ENUM_VALUE_OPTION);
            self.push(
                DeclKind::EnumValue,
                &value.name,
                qualify(scope, &value.name),
                value_path,
                Some(index),
                &value.span,
                &value.comment,
                options,
                DeclDetail::EnumValue { number: value.number },
            );
        }
    }

    fn service(&mut self, service: &SyntaxService, scope: &str, path: DeclPath) {
        let full_name = qualify(scope, &service.name);
        let options = self.options(&service.options, &path, SERVICE_OPTION);
        let index = self.push(
            DeclKind::Service,
            &service.name,
            full_name.clone(),
            path.clone(),
            None,
            &service.span,
            &service.comment,
            options,
            DeclDetail::Service,
        );

        for (i, method) in service.methods.iter().enumerate() {
            let method_path = path.child(SERVICE_METHOD, i);
            let options = self.options(&method.options, &method_path, METHOD_OPTION);
            self.push(
                DeclKind::Method,
                &method.name,
                qualify(&full_name, &method.name),
                method_path,
                Some(index),
                &method.span,
                &method.comment,
                options,
                DeclDetail::Method {
                    input: TypeRef::unresolved(method.input.clone()),
                    output: TypeRef::unresolved(method.output.clone()),
                    client_streaming: method.client_streaming,
                    server_streaming: method.server_streaming,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protolith_core::syntax::{SyntaxEnumValue, SyntaxMethod, SyntaxOneof};

    fn field(name: &str, number: i32, ty: SyntaxType) -> SyntaxField {
        SyntaxField {
            name: name.to_string(),
            number,
            label: Label::Optional,
            ty,
            oneof: None,
            extendee: None,
            comment: None,
            options: Vec::new(),
            span: Span::line(number as usize + 1, 3),
        }
    }

    fn syntax() -> SyntaxFile {
        SyntaxFile {
            package: Some("acme.v1".to_string()),
            messages: vec![SyntaxMessage {
                name: "User".to_string(),
                fields: vec![
                    field("id", 1, SyntaxType::Scalar { scalar: Scalar::String }),
                    field("role", 2, SyntaxType::Named { name: "Role".to_string() }),
                ],
                oneofs: vec![SyntaxOneof {
                    name: "contact".to_string(),
                    comment: None,
                    span: Span::default(),
                }],
                enums: vec![SyntaxEnum {
                    name: "Role".to_string(),
                    values: vec![SyntaxEnumValue {
                        name: "ROLE_UNSPECIFIED".to_string(),
                        number: 0,
                        comment: None,
                        options: Vec::new(),
                        span: Span::default(),
                    }],
                    ..SyntaxEnum::default()
                }],
                ..SyntaxMessage::default()
            }],
            services: vec![SyntaxService {
                name: "UserService".to_string(),
                methods: vec![SyntaxMethod {
                    name: "GetUser".to_string(),
                    input: "GetUserRequest".to_string(),
                    output: "User".to_string(),
                    client_streaming: false,
                    server_streaming: false,
                    options: Vec::new(),
                    comment: Some("  ".to_string()),
                    span: Span::default(),
                }],
                ..SyntaxService::default()
            }],
            ..SyntaxFile::default()
        }
    }

    fn tree() -> DeclarationTree {
        let file = FileId::new(ModuleRef::local("acme/api"), "acme/v1/user.proto");
        DeclarationTree::build(file, Digest::of(b"user"), &syntax())
    }

    fn find<'a>(tree: &'a DeclarationTree, full_name: &str) -> &'a Declaration {
        tree.declarations
            .iter()
            .find(|d| d.full_name == full_name)
            .unwrap_or_else(|| panic!("{} not found", full_name))
    }

    #[test]
    fn qualifies_names_by_package_and_nesting() {
        let tree = tree();
        assert_eq!(find(&tree, "acme.v1.User").kind, DeclKind::Message);
        assert_eq!(find(&tree, "acme.v1.User.role").kind, DeclKind::Field);
        assert_eq!(find(&tree, "acme.v1.User.contact").kind, DeclKind::Oneof);
        assert_eq!(find(&tree, "acme.v1.User.Role").kind, DeclKind::Enum);
        assert_eq!(find(&tree, "acme.v1.UserService.GetUser").kind, DeclKind::Method);
    }

    #[test]
    fn enum_values_are_siblings_of_their_enum() {
        let tree = tree();
        let value = find(&tree, "acme.v1.User.ROLE_UNSPECIFIED");
        assert_eq!(value.kind, DeclKind::EnumValue);
        assert_eq!(value.path.as_slice(), &[4, 0, 4, 0, 2, 0]);
    }

    #[test]
    fn assigns_structural_paths() {
        let tree = tree();
        assert_eq!(find(&tree, "acme.v1.User").path.as_slice(), &[4, 0]);
        assert_eq!(find(&tree, "acme.v1.User.role").path.as_slice(), &[4, 0, 2, 1]);
        assert_eq!(find(&tree, "acme.v1.User.contact").path.as_slice(), &[4, 0, 8, 0]);
        assert_eq!(find(&tree, "acme.v1.UserService.GetUser").path.as_slice(), &[6, 0, 2, 0]);
    }

    #[test]
    fn records_locations_and_parents() {
        let tree = tree();
        let role = find(&tree, "acme.v1.User.role");
        assert_eq!(role.location.file, "acme/v1/user.proto");
        assert_eq!(role.location.line, Some(3));
        let parent = role.parent.map(|p| &tree.declarations[p]).unwrap();
        assert_eq!(parent.full_name, "acme.v1.User");
    }

    #[test]
    fn blank_comments_are_dropped() {
        let tree = tree();
        assert_eq!(find(&tree, "acme.v1.UserService.GetUser").comment, None);
    }
}
