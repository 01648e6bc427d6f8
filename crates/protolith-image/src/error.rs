//! Image build errors
//!
//! Every variant is fatal to the build. Errors are collected across the whole
//! image rather than stopping at the first one.

use protolith_core::Location;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("{path}: conflicting files at the same path in {first} and {second}")]
    ConflictingFile { path: String, first: String, second: String },

    #[error("{location}: unresolved type {name}{}", hint_suffix(.hint))]
    UnresolvedType {
        name: String,
        location: Location,
        hint: Option<String>,
    },

    #[error("{location}: import {path} was not found")]
    UnresolvedImport { path: String, location: Location },

    #[error("{location}: {name} is already defined at {previous}")]
    DuplicateDeclaration {
        name: String,
        location: Location,
        previous: Location,
    },

    #[error("{location}: field number {number} in {message} is already used by {previous}")]
    DuplicateFieldNumber {
        message: String,
        number: i32,
        previous: String,
        location: Location,
    },

    #[error("{location}: {name} uses reserved number {number}")]
    ReservedNumber { name: String, number: i32, location: Location },

    #[error("{location}: {name} uses a reserved name")]
    ReservedName { name: String, location: Location },

    #[error("{location}: field number {number} of {name} is out of range")]
    InvalidFieldNumber { name: String, number: i32, location: Location },

    #[error("{location}: enum value number {number} in {enum_name} is already used by {previous} (set allow_alias to permit)")]
    DuplicateEnumNumber {
        enum_name: String,
        number: i32,
        previous: String,
        location: Location,
    },
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref().map(|h| format!(" ({})", h)).unwrap_or_default()
}

impl BuildError {
    /// Location used to order errors; file conflicts sort by path
    pub fn location(&self) -> Location {
        match self {
            Self::ConflictingFile { path, .. } => Location::new(path.clone()),
            Self::UnresolvedType { location, .. }
            | Self::UnresolvedImport { location, .. }
            | Self::DuplicateDeclaration { location, .. }
            | Self::DuplicateFieldNumber { location, .. }
            | Self::ReservedNumber { location, .. }
            | Self::ReservedName { location, .. }
            | Self::InvalidFieldNumber { location, .. }
            | Self::DuplicateEnumNumber { location, .. } => location.clone(),
        }
    }
}

/// All errors of one failed build, sorted by location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildErrors {
    pub errors: Vec<BuildError>,
}

impl BuildErrors {
    pub fn new(mut errors: Vec<BuildError>) -> Self {
        errors.sort_by(|a, b| {
            let (la, lb) = (a.location(), b.location());
            (&la.file, la.line, la.column, a.to_string()).cmp(&(&lb.file, lb.line, lb.column, b.to_string()))
        });
        errors.dedup();
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildError> {
        self.errors.iter()
    }
}

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for BuildErrors {}

impl From<BuildError> for BuildErrors {
    fn from(error: BuildError) -> Self {
        Self::new(vec![error])
    }
}
