//! Configuration schema (protolith.toml)

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workspace layout settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root module names; empty means every module in the workspace directory
    #[serde(default)]
    pub roots: Vec<String>,
}

/// Rule selection for one analyzer family (lint or breaking)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Category names to enable
    #[serde(default, rename = "use")]
    pub use_: Vec<String>,

    /// Category names or rule ids to disable
    #[serde(default)]
    pub except: Vec<String>,

    /// Path globs excluded from all rules
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Rule id -> path globs excluded for that rule only
    #[serde(default)]
    pub ignore_only: BTreeMap<String, Vec<String>>,
}

impl RuleConfig {
    /// Enable the given categories
    pub fn using<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            use_: categories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_except(mut self, entry: impl Into<String>) -> Self {
        self.except.push(entry.into());
        self
    }

    pub fn with_ignore(mut self, glob: impl Into<String>) -> Self {
        self.ignore.push(glob.into());
        self
    }

    pub fn with_ignore_only(mut self, rule_id: impl Into<String>, glob: impl Into<String>) -> Self {
        self.ignore_only.entry(rule_id.into()).or_default().push(glob.into());
        self
    }

    /// Compile the path suppressions of this configuration
    pub fn ignore_filter(&self) -> Result<IgnoreFilter, ConfigError> {
        let ignore = compile_globs(&self.ignore)?;
        let ignore_only = self
            .ignore_only
            .iter()
            .map(|(rule_id, globs)| Ok((rule_id.clone(), compile_globs(globs)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Ok(IgnoreFilter { ignore, ignore_only })
    }
}

/// Compiled `ignore` / `ignore_only` path suppressions
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    ignore: GlobSet,
    ignore_only: BTreeMap<String, GlobSet>,
}

impl IgnoreFilter {
    /// Filter that suppresses nothing
    pub fn none() -> Self {
        Self {
            ignore: GlobSet::empty(),
            ignore_only: BTreeMap::new(),
        }
    }

    /// Check whether findings of `rule_id` in `path` are suppressed
    pub fn is_ignored(&self, rule_id: &str, path: &str) -> bool {
        if self.ignore.is_match(path) {
            return true;
        }

        self.ignore_only
            .get(rule_id)
            .map(|globs| globs.is_match(path))
            .unwrap_or(false)
    }
}

/// Compile globs; a bare path also matches everything below it
fn compile_globs(globs: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let trimmed = pattern.trim_end_matches('/');
        for candidate in [trimmed.to_string(), format!("{}/**", trimmed)] {
            let glob = Glob::new(&candidate).map_err(|e| ConfigError::InvalidGlob {
                glob: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
    }
    builder.build().map_err(|e| ConfigError::InvalidGlob {
        glob: globs.join(", "),
        reason: e.to_string(),
    })
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Lint rule selection
    #[serde(default)]
    pub lint: RuleConfig,

    /// Breaking-change rule selection
    #[serde(default)]
    pub breaking: RuleConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Config error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown category \"{0}\"")]
    UnknownCategory(String),

    #[error("Unknown rule or category \"{0}\" in except")]
    UnknownRule(String),

    #[error("Invalid glob \"{glob}\": {reason}")]
    InvalidGlob { glob: String, reason: String },
}
