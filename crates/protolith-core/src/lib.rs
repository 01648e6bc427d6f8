//! Protolith Core
//!
//! Shared domain model with stable, versioned types.
//! Never rename rule ids - they are part of the public API.

pub mod cancel;
pub mod config;
pub mod diagnostic;
pub mod module;
pub mod report;
pub mod syntax;

pub use cancel::CancellationToken;
pub use config::{Config, ConfigError, IgnoreFilter, RuleConfig, WorkspaceConfig};
pub use diagnostic::{Finding, Location, Severity, DEPENDENCY_VERSION_SKEW, RULE_INTERNAL_ERROR};
pub use module::{Dependency, Digest, ModuleManifest, ModuleRef};
pub use report::{Report, ReportSummary, ReportVersion};
pub use syntax::{Label, Scalar, Span, SyntaxFile, SyntaxType};
