//! Rule catalog
//!
//! Categories are plain sets of rule ids. The subset relation between them is
//! computed once when the catalog is built; nothing is inherited. A catalog is
//! an ordinary value: build it once and pass it by reference.

use crate::rule::{BreakingCheck, LintCheck, Rule};
use crate::{breaking, lint};
use protolith_core::{ConfigError, IgnoreFilter, RuleConfig};
use std::collections::{BTreeMap, BTreeSet};

/// Category holding every rule of a family
pub const ALL: &str = "ALL";

/// Rules of one family grouped into categories
#[derive(Debug, Clone)]
pub struct RuleFamily<C> {
    rules: BTreeMap<&'static str, Rule<C>>,
    categories: BTreeMap<&'static str, BTreeSet<&'static str>>,

    /// category -> categories it contains (itself excluded)
    subsets: BTreeMap<&'static str, BTreeSet<&'static str>>,

    default_category: &'static str,
}

impl<C: Clone> RuleFamily<C> {
    /// Register `rules`; `categories` fixes the known category names
    pub fn new(rules: Vec<Rule<C>>, categories: &[&'static str], default_category: &'static str) -> Self {
        let mut sets: BTreeMap<&'static str, BTreeSet<&'static str>> =
            categories.iter().map(|c| (*c, BTreeSet::new())).collect();
        let all = sets.entry(ALL).or_default();
        all.extend(rules.iter().map(|r| r.id));

        for rule in &rules {
            for category in rule.categories {
                sets.entry(*category).or_default().insert(rule.id);
            }
        }

        let subsets = sets
            .iter()
            .map(|(name, ids)| {
                let contained = sets
                    .iter()
                    .filter(|(other, other_ids)| other != &name && other_ids.is_subset(ids))
                    .map(|(other, _)| *other)
                    .collect();
                (*name, contained)
            })
            .collect();

        Self {
            rules: rules.into_iter().map(|r| (r.id, r)).collect(),
            categories: sets,
            subsets,
            default_category,
        }
    }

    pub fn rule(&self, id: &str) -> Option<&Rule<C>> {
        self.rules.get(id)
    }

    /// Every rule, ordered by id
    pub fn rules(&self) -> impl Iterator<Item = &Rule<C>> {
        self.rules.values()
    }

    pub fn category_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.categories.keys().copied()
    }

    pub fn category(&self, name: &str) -> Option<&BTreeSet<&'static str>> {
        self.categories.get(name)
    }

    /// Categories wholly contained in `name`
    pub fn subsets_of(&self, name: &str) -> Option<&BTreeSet<&'static str>> {
        self.subsets.get(name)
    }

    pub fn is_subset(&self, smaller: &str, larger: &str) -> bool {
        self.subsets.get(larger).map(|s| s.contains(smaller)).unwrap_or(false)
    }

    pub fn default_category(&self) -> &'static str {
        self.default_category
    }

    /// Ids named by a category or rule id
    fn expand(&self, entry: &str) -> Option<BTreeSet<&'static str>> {
        if let Some(ids) = self.categories.get(entry) {
            return Some(ids.clone());
        }
        self.rules.get_key_value(entry).map(|(id, _)| BTreeSet::from([*id]))
    }

    /// Union of `use` minus `except`; exclusion always wins
    pub fn resolve(&self, config: &RuleConfig) -> Result<RuleSet<C>, ConfigError> {
        let uses: Vec<&str> = if config.use_.is_empty() {
            vec![self.default_category]
        } else {
            config.use_.iter().map(|s| s.as_str()).collect()
        };

        let mut enabled = BTreeSet::new();
        for entry in uses {
            let ids = self
                .expand(entry)
                .ok_or_else(|| ConfigError::UnknownCategory(entry.to_string()))?;
            enabled.extend(ids);
        }

        for entry in &config.except {
            let ids = self
                .expand(entry)
                .ok_or_else(|| ConfigError::UnknownRule(entry.clone()))?;
            for id in ids {
                enabled.remove(id);
            }
        }

        let filter = config.ignore_filter()?;
        let rules = enabled.into_iter().filter_map(|id| self.rules.get(id).cloned()).collect();
        Ok(RuleSet::new(rules, filter))
    }
}

/// Effective rules of one run plus their path suppressions
#[derive(Debug, Clone)]
pub struct RuleSet<C> {
    rules: Vec<Rule<C>>,
    filter: IgnoreFilter,
}

impl<C> RuleSet<C> {
    /// Rules are kept ordered by id
    pub fn new(mut rules: Vec<Rule<C>>, filter: IgnoreFilter) -> Self {
        rules.sort_by_key(|r| r.id);
        Self { rules, filter }
    }

    pub fn rules(&self) -> &[Rule<C>] {
        &self.rules
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.iter().any(|r| r.id == id)
    }

    pub fn filter(&self) -> &IgnoreFilter {
        &self.filter
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Every built-in rule
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    pub lint: RuleFamily<LintCheck>,
    pub breaking: RuleFamily<BreakingCheck>,
}

impl RuleCatalog {
    /// Catalog of the built-in lint and breaking rules
    pub fn builtin() -> Self {
        Self {
            lint: RuleFamily::new(lint::rules(), lint::CATEGORIES, lint::DEFAULT),
            breaking: RuleFamily::new(breaking::rules(), breaking::CATEGORIES, breaking::FILE),
        }
    }

    pub fn resolve_lint(&self, config: &RuleConfig) -> Result<RuleSet<LintCheck>, ConfigError> {
        self.lint.resolve(config)
    }

    pub fn resolve_breaking(&self, config: &RuleConfig) -> Result<RuleSet<BreakingCheck>, ConfigError> {
        self.breaking.resolve(config)
    }
}
