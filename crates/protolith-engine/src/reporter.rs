//! Finding normalization

use protolith_core::{Finding, IgnoreFilter};
use std::collections::HashSet;

/// Deduplicate, apply path suppressions and put findings in report order
///
/// Findings without a location (internal rule errors) are never suppressed.
/// The output is a fixed point: normalizing it again changes nothing.
pub fn report(findings: Vec<Finding>, filter: &IgnoreFilter) -> Vec<Finding> {
    let mut seen = HashSet::new();

    let mut kept: Vec<Finding> = findings
        .into_iter()
        .filter(|f| match &f.location {
            Some(location) => !filter.is_ignored(&f.rule_id, &location.file),
            None => true,
        })
        .filter(|f| seen.insert((f.rule_id.clone(), f.location.clone(), f.message.clone())))
        .collect();

    kept.sort_by(|a, b| a.report_order(b));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use protolith_core::{Location, RuleConfig, Severity, RULE_INTERNAL_ERROR};

    fn finding(rule: &str, file: &str, line: usize) -> Finding {
        Finding::new(rule, Severity::Error, format!("{} at {}", rule, line))
            .with_location(Location::with_position(file, line, 1))
    }

    fn sample() -> Vec<Finding> {
        vec![
            finding("FIELD_LOWER_SNAKE_CASE", "legacy/old.proto", 4),
            finding("ENUM_PASCAL_CASE", "acme/v1/b.proto", 2),
            finding("FIELD_LOWER_SNAKE_CASE", "acme/v1/a.proto", 9),
            finding("ENUM_PASCAL_CASE", "acme/v1/b.proto", 2),
            finding("MESSAGE_PASCAL_CASE", "vendor/x.proto", 1),
            Finding::new(RULE_INTERNAL_ERROR, Severity::Error, "rule X failed: boom"),
        ]
    }

    #[test]
    fn dedup_suppress_and_order() {
        let filter = RuleConfig::default()
            .with_ignore("vendor/**")
            .with_ignore_only("FIELD_LOWER_SNAKE_CASE", "legacy/**")
            .ignore_filter()
            .unwrap();

        let rendered: Vec<String> = report(sample(), &filter).iter().map(|f| f.to_string()).collect();

        assert_eq!(
            rendered,
            vec![
                "RULE_INTERNAL_ERROR rule X failed: boom",
                "acme/v1/a.proto:9:1:FIELD_LOWER_SNAKE_CASE FIELD_LOWER_SNAKE_CASE at 9",
                "acme/v1/b.proto:2:1:ENUM_PASCAL_CASE ENUM_PASCAL_CASE at 2",
            ]
        );
    }

    #[test]
    fn suppression_is_idempotent() {
        let filter = RuleConfig::default().with_ignore("vendor/**").ignore_filter().unwrap();

        let once = report(sample(), &filter);
        let twice = report(once.clone(), &filter);

        assert_eq!(once, twice);
    }

    #[test]
    fn ignore_only_for_absent_rule_is_a_no_op() {
        let filter = RuleConfig::default()
            .with_ignore_only("RPC_NO_SERVER_STREAMING", "**")
            .ignore_filter()
            .unwrap();

        assert_eq!(report(sample(), &filter), report(sample(), &IgnoreFilter::none()));
        assert_eq!(report(sample(), &filter).len(), 5);
    }
}
