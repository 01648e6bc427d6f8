//! Parser output: the structured syntax tree of one schema file
//!
//! The textual parser lives outside this workspace. It hands over one
//! [`SyntaxFile`] per schema file, with every node annotated by its [`Span`].
//! Nothing here is resolved yet: type names are the text the author wrote.

use serde::{Deserialize, Serialize};

/// Byte range plus line/column position of a syntax node (1-indexed lines and columns)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    /// Span for a single line, mostly useful in tests
    pub fn line(line: usize, column: usize) -> Self {
        Self {
            start: 0,
            end: 0,
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }
}

/// Scalar field types built into the language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl Scalar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field type as written in the source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SyntaxType {
    /// Built-in scalar
    Scalar { scalar: Scalar },

    /// Named message or enum, possibly partially qualified (`Foo`, `pkg.Foo`, `.pkg.Foo`)
    Named { name: String },

    /// `map<key, value>`
    Map { key: Scalar, value: Box<SyntaxType> },
}

/// Field cardinality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optional => write!(f, "optional"),
            Self::Required => write!(f, "required"),
            Self::Repeated => write!(f, "repeated"),
        }
    }
}

/// `option name = value;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxOption {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub span: Span,
}

/// `import [public|weak] "path";`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxImport {
    pub path: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub weak: bool,
    #[serde(default)]
    pub span: Span,
}

/// Inclusive number range in a `reserved` statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservedRange {
    pub start: i32,
    pub end: i32,
}

impl ReservedRange {
    pub fn contains(&self, number: i32) -> bool {
        self.start <= number && number <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxField {
    pub name: String,
    pub number: i32,
    #[serde(default)]
    pub label: Label,
    #[serde(rename = "type")]
    pub ty: SyntaxType,
    /// Index into the enclosing message's oneofs
    #[serde(default)]
    pub oneof: Option<usize>,
    /// Extendee for fields declared in an `extend` block
    #[serde(default)]
    pub extendee: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub options: Vec<SyntaxOption>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxOneof {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxMessage {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<SyntaxField>,
    #[serde(default)]
    pub messages: Vec<SyntaxMessage>,
    #[serde(default)]
    pub enums: Vec<SyntaxEnum>,
    #[serde(default)]
    pub oneofs: Vec<SyntaxOneof>,
    #[serde(default)]
    pub reserved: Vec<ReservedRange>,
    #[serde(default)]
    pub reserved_names: Vec<String>,
    #[serde(default)]
    pub options: Vec<SyntaxOption>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxEnumValue {
    pub name: String,
    pub number: i32,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub options: Vec<SyntaxOption>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxEnum {
    pub name: String,
    #[serde(default)]
    pub values: Vec<SyntaxEnumValue>,
    #[serde(default)]
    pub reserved: Vec<ReservedRange>,
    #[serde(default)]
    pub reserved_names: Vec<String>,
    #[serde(default)]
    pub options: Vec<SyntaxOption>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxMethod {
    pub name: String,
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub client_streaming: bool,
    #[serde(default)]
    pub server_streaming: bool,
    #[serde(default)]
    pub options: Vec<SyntaxOption>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxService {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<SyntaxMethod>,
    #[serde(default)]
    pub options: Vec<SyntaxOption>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub span: Span,
}

/// Structured parse result of one schema file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxFile {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub package_span: Span,
    #[serde(default)]
    pub imports: Vec<SyntaxImport>,
    #[serde(default)]
    pub options: Vec<SyntaxOption>,
    #[serde(default)]
    pub messages: Vec<SyntaxMessage>,
    #[serde(default)]
    pub enums: Vec<SyntaxEnum>,
    #[serde(default)]
    pub services: Vec<SyntaxService>,
    /// Fields declared in top-level `extend` blocks
    #[serde(default)]
    pub extensions: Vec<SyntaxField>,
}

impl SyntaxFile {
    /// Parse a syntax tree from its JSON interchange form
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
