//! Findings and their source locations
//!
//! IMPORTANT: rule ids are part of the public API.
//! NEVER rename or remove a rule id - add new ids only.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::syntax::Span;

/// Rule id reserved for a rule that failed internally instead of reporting
pub const RULE_INTERNAL_ERROR: &str = "RULE_INTERNAL_ERROR";

/// Rule id used by the module resolver for tolerated diamond version skew
pub const DEPENDENCY_VERSION_SKEW: &str = "DEPENDENCY_VERSION_SKEW";

/// Finding severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that should fail CI
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a schema file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path relative to its module root
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,

    /// Optional column number (1-indexed)
    pub column: Option<usize>,

    /// Optional end line (for ranges)
    pub end_line: Option<usize>,

    /// Optional end column (for ranges)
    pub end_column: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        }
    }

    /// Create a location with file, line, and column
    pub fn with_position(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            ..Self::new(file)
        }
    }

    /// Create a location covering a parser span
    pub fn from_span(file: impl Into<String>, span: &Span) -> Self {
        Self {
            file: file.into(),
            line: Some(span.line),
            column: Some(span.column),
            end_line: Some(span.end_line),
            end_column: Some(span.end_column),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{}:{}", self.file, line, column),
            (Some(line), None) => write!(f, "{}:{}", self.file, line),
            _ => write!(f, "{}", self.file),
        }
    }
}

/// A structured result emitted by a rule
///
/// Findings are value objects: two findings with the same rule id, location
/// and message are the same finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    /// Stable rule id
    pub rule_id: String,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Location of the matching declaration in the image compared against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub against: Option<Location>,
}

impl Finding {
    /// Create a new finding with minimal fields
    pub fn new(rule_id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            location: None,
            against: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the location in the image compared against
    pub fn with_against(mut self, against: Location) -> Self {
        self.against = Some(against);
        self
    }

    /// File path of the finding, empty when it has no location
    pub fn file(&self) -> &str {
        self.location.as_ref().map(|l| l.file.as_str()).unwrap_or("")
    }

    /// Report order: file path, line, column, rule id, then message
    pub fn report_order(&self, other: &Self) -> Ordering {
        let position = |f: &Self| {
            f.location
                .as_ref()
                .map(|l| (l.line.unwrap_or(0), l.column.unwrap_or(0)))
                .unwrap_or((0, 0))
        };

        self.file()
            .cmp(other.file())
            .then_with(|| position(self).cmp(&position(other)))
            .then_with(|| self.rule_id.cmp(&other.rule_id))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}:{} {}", location, self.rule_id, self.message),
            None => write!(f, "{} {}", self.rule_id, self.message),
        }
    }
}
