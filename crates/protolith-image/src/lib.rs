//! Image construction
//!
//! This crate handles:
//! - The parser seam ([`SchemaParser`]) turning source files into syntax trees
//! - Declaration trees with structural paths and source locations
//! - Merging every module's trees into one reference-bound [`Image`]
//! - The resolve, fetch and build pipeline

pub mod builder;
pub mod error;
pub mod image;
pub mod parse;
pub mod path;
pub mod pipeline;
pub mod tree;

pub use builder::{build, MAX_FIELD_NUMBER};
pub use error::{BuildError, BuildErrors};
pub use image::{DeclHandle, Image, ImageFile};
pub use parse::{JsonSyntaxParser, ParseError, SchemaParser};
pub use path::DeclPath;
pub use pipeline::{build_workspace, PipelineError, WorkspaceBuild};
pub use tree::{DeclDetail, DeclKind, Declaration, DeclarationTree, FieldType, FileId, Import, OptionAssignment, TypeRef};
