//! Parser seam
//!
//! The textual grammar is parsed elsewhere; the toolchain only needs something
//! that turns a source file into a [`SyntaxFile`].

use protolith_core::SyntaxFile;
use protolith_source::SourceFile;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ParseError {
    pub path: String,
    pub message: String,
}

pub trait SchemaParser: Send + Sync {
    fn parse(&self, file: &SourceFile) -> Result<SyntaxFile, ParseError>;
}

/// Reads syntax trees already rendered as JSON by an external parser
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSyntaxParser;

impl SchemaParser for JsonSyntaxParser {
    fn parse(&self, file: &SourceFile) -> Result<SyntaxFile, ParseError> {
        SyntaxFile::from_json(&file.content).map_err(|e| ParseError {
            path: file.path.clone(),
            message: e.to_string(),
        })
    }
}
