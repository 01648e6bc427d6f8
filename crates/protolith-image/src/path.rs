//! Structural declaration paths
//!
//! A path is the sequence of (field tag, index) pairs leading from the file
//! root to a declaration, numbered the way descriptor source locations are:
//! the second message of a file is `[4, 1]`, its sixth field `[4, 1, 2, 5]`.
//! Paths ignore names, so a renamed declaration keeps its path as long as it
//! does not move.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// File: top-level messages
pub const FILE_MESSAGE: u32 = 4;
/// File: top-level enums
pub const FILE_ENUM: u32 = 5;
/// File: services
pub const FILE_SERVICE: u32 = 6;
/// File: top-level extensions
pub const FILE_EXTENSION: u32 = 7;
/// File: options
pub const FILE_OPTION: u32 = 8;

/// Message: fields
pub const MESSAGE_FIELD: u32 = 2;
/// Message: nested messages
pub const MESSAGE_NESTED: u32 = 3;
/// Message: nested enums
pub const MESSAGE_ENUM: u32 = 4;
/// Message: options
pub const MESSAGE_OPTION: u32 = 7;
/// Message: oneofs
pub const MESSAGE_ONEOF: u32 = 8;

/// Field: options
pub const FIELD_OPTION: u32 = 8;

/// Enum: values
pub const ENUM_VALUE: u32 = 2;
/// Enum: options
pub const ENUM_OPTION: u32 = 3;
/// Enum value: options
pub const ENUM_VALUE_OPTION: u32 = 3;

/// Service: methods
pub const SERVICE_METHOD: u32 = 2;
/// Service: options
pub const SERVICE_OPTION: u32 = 3;
/// Method: options
pub const METHOD_OPTION: u32 = 4;

/// Immutable, cheaply cloned structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclPath(Arc<[u32]>);

impl DeclPath {
    /// Empty path (the file itself)
    pub fn root() -> Self {
        Self(Arc::from(Vec::<u32>::new()))
    }

    /// Path extended by one (tag, index) step
    pub fn child(&self, tag: u32, index: usize) -> Self {
        let mut parts = self.0.to_vec();
        parts.push(tag);
        parts.push(index as u32);
        Self(Arc::from(parts))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Index of the last step
    pub fn last_index(&self) -> Option<u32> {
        self.0.last().copied()
    }
}

impl From<Vec<u32>> for DeclPath {
    fn from(parts: Vec<u32>) -> Self {
        Self(Arc::from(parts))
    }
}

impl fmt::Display for DeclPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
