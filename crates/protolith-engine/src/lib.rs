//! Protolith rule engine
//!
//! Resolves effective rule sets from configuration, runs lint rules over one
//! image and breaking rules over a pair of images, and normalizes the
//! resulting findings for reporting.

pub mod breaking;
pub mod cache;
pub mod catalog;
pub mod lint;
pub mod reporter;
pub mod rule;
pub mod runner;

pub use cache::RunCache;
pub use catalog::{RuleCatalog, RuleFamily, RuleSet, ALL};
pub use reporter::report;
pub use rule::{BreakingCheck, BreakingContext, BreakingRule, LintCheck, LintContext, LintRule, Rule, RuleError};
pub use runner::{detect_breaking, lint, EngineError};
