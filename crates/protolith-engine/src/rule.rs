//! Rule definitions and the contexts rules run in
//!
//! A rule is a plain function pointer plus metadata. Rules never mutate the
//! images they inspect; each returns its own list of findings.

use crate::cache::RunCache;
use protolith_core::{Finding, Location, Severity};
use protolith_image::Image;
use serde::Serialize;

/// Unexpected failure inside a rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("{0}")]
    Internal(String),

    /// A bound reference points at nothing, which a built image never allows
    #[error("dangling reference {0}")]
    DanglingReference(String),
}

/// Lint rule body
pub type LintCheck = fn(&LintContext<'_>) -> Result<Vec<Finding>, RuleError>;

/// Breaking rule body
pub type BreakingCheck = fn(&BreakingContext<'_>) -> Result<Vec<Finding>, RuleError>;

/// A registered rule
#[derive(Clone, Serialize)]
pub struct Rule<C> {
    /// Stable rule id (never renamed)
    pub id: &'static str,

    /// One-line description for `ls-rules`
    pub purpose: &'static str,

    /// Categories this rule belongs to, besides ALL
    pub categories: &'static [&'static str],

    pub severity: Severity,

    #[serde(skip)]
    pub check: C,
}

impl<C> std::fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("categories", &self.categories)
            .field("severity", &self.severity)
            .finish()
    }
}

pub type LintRule = Rule<LintCheck>;
pub type BreakingRule = Rule<BreakingCheck>;

/// What a lint rule sees
pub struct LintContext<'a> {
    pub image: &'a Image,
    pub cache: &'a RunCache,
    pub(crate) rule_id: &'static str,
    pub(crate) severity: Severity,
}

impl<'a> LintContext<'a> {
    pub fn new(cache: &'a RunCache, rule_id: &'static str, severity: Severity) -> Self {
        Self {
            image: cache.image(),
            cache,
            rule_id,
            severity,
        }
    }

    /// Finding of the running rule at `location`
    pub fn finding(&self, location: &Location, message: impl Into<String>) -> Finding {
        Finding::new(self.rule_id, self.severity, message).with_location(location.clone())
    }
}

/// What a breaking rule sees
pub struct BreakingContext<'a> {
    pub before: &'a RunCache,
    pub after: &'a RunCache,
    pub(crate) rule_id: &'static str,
    pub(crate) severity: Severity,
}

impl<'a> BreakingContext<'a> {
    pub fn new(before: &'a RunCache, after: &'a RunCache, rule_id: &'static str, severity: Severity) -> Self {
        Self {
            before,
            after,
            rule_id,
            severity,
        }
    }

    /// Finding located in the new image, pointing back at the old one
    pub fn finding(&self, location: &Location, against: &Location, message: impl Into<String>) -> Finding {
        Finding::new(self.rule_id, self.severity, message)
            .with_location(location.clone())
            .with_against(against.clone())
    }
}
