//! Resolution error taxonomy

use protolith_source::SourceError;

/// Errors that abort module resolution; no partial graph is ever returned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// A provider failed; callers may retry, the resolver does not
    #[error("Dependency {module} unavailable: {source}")]
    DependencyUnavailable {
        module: String,
        #[source]
        source: SourceError,
    },

    /// The dependency graph has a cycle; `cycle` starts and ends with the same module
    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// Incompatible versions of one module are required
    #[error("Version conflict for {module}: {} (required by {})", .versions.join(", "), .required_by.join(", "))]
    VersionConflict {
        module: String,
        versions: Vec<String>,
        required_by: Vec<String>,
    },

    #[error("Resolution cancelled")]
    Cancelled,
}

impl ResolutionError {
    /// Map a provider failure for `module` onto the resolution taxonomy
    pub fn unavailable(module: impl ToString, source: SourceError) -> Self {
        Self::DependencyUnavailable {
            module: module.to_string(),
            source,
        }
    }
}
