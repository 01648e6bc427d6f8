//! Rule execution
//!
//! Rules are split into one chunk per available core and evaluated on
//! blocking workers over the shared, read-only image. Each worker collects
//! into its own list; the lists are merged and sorted once every worker is
//! done, so the result never depends on scheduling.

use crate::cache::RunCache;
use crate::catalog::RuleSet;
use crate::rule::{BreakingCheck, BreakingContext, LintCheck, LintContext, Rule, RuleError};
use protolith_core::{CancellationToken, Finding, Severity, RULE_INTERNAL_ERROR};
use protolith_image::Image;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("rule evaluation was cancelled")]
    Cancelled,

    #[error("rule worker failed: {0}")]
    Worker(String),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Run lint `rules` over `image`
pub async fn lint(
    image: Arc<Image>,
    rules: &RuleSet<LintCheck>,
    cancel: &CancellationToken,
) -> Result<Vec<Finding>, EngineError> {
    let cache = Arc::new(RunCache::new(image));
    run(rules.rules(), cancel, move |rule: &Rule<LintCheck>| {
        (rule.check)(&LintContext::new(&cache, rule.id, rule.severity))
    })
    .await
}

/// Run breaking `rules` comparing `before` with `after`
pub async fn detect_breaking(
    before: Arc<Image>,
    after: Arc<Image>,
    rules: &RuleSet<BreakingCheck>,
    cancel: &CancellationToken,
) -> Result<Vec<Finding>, EngineError> {
    let before = Arc::new(RunCache::new(before));
    let after = Arc::new(RunCache::new(after));
    run(rules.rules(), cancel, move |rule: &Rule<BreakingCheck>| {
        (rule.check)(&BreakingContext::new(&before, &after, rule.id, rule.severity))
    })
    .await
}

async fn run<C, F>(rules: &[Rule<C>], cancel: &CancellationToken, evaluate: F) -> Result<Vec<Finding>, EngineError>
where
    C: Clone + Send + 'static,
    F: Fn(&Rule<C>) -> Result<Vec<Finding>, RuleError> + Send + Sync + 'static,
{
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let chunk_size = rules.len().div_ceil(workers).max(1);
    let evaluate = Arc::new(evaluate);

    let mut set = JoinSet::new();
    for chunk in rules.chunks(chunk_size) {
        let chunk = chunk.to_vec();
        let evaluate = Arc::clone(&evaluate);
        set.spawn_blocking(move || {
            chunk
                .iter()
                .flat_map(|rule| isolate(rule, evaluate.as_ref()))
                .collect::<Vec<Finding>>()
        });
    }

    let mut findings = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                set.abort_all();
                return Err(EngineError::Cancelled);
            }
            next = set.join_next() => match next {
                Some(Ok(chunk)) => findings.extend(chunk),
                Some(Err(e)) => return Err(EngineError::Worker(e.to_string())),
                None => break,
            }
        }
    }

    findings.sort_by(|a, b| a.report_order(b));
    Ok(findings)
}

/// Evaluate one rule; a failure becomes a finding instead of ending the run
fn isolate<C, F>(rule: &Rule<C>, evaluate: &F) -> Vec<Finding>
where
    F: Fn(&Rule<C>) -> Result<Vec<Finding>, RuleError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| evaluate(rule))) {
        Ok(Ok(findings)) => findings,
        Ok(Err(e)) => vec![internal_error(rule.id, &e.to_string())],
        Err(payload) => vec![internal_error(rule.id, &panic_message(payload.as_ref()))],
    }
}

fn internal_error(rule_id: &str, reason: &str) -> Finding {
    Finding::new(
        RULE_INTERNAL_ERROR,
        Severity::Error,
        format!("rule {} failed: {}", rule_id, reason),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::fixture;
    use crate::rule::LintRule;
    use protolith_core::{IgnoreFilter, Location};
    use serde_json::json;

    fn image() -> Arc<Image> {
        Arc::new(fixture::image(&[(
            "acme/v1/a.proto",
            json!({ "package": "acme.v1", "messages": [{ "name": "Order" }] }),
        )]))
    }

    fn reports(ctx: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(vec![ctx.finding(&Location::with_position("acme/v1/a.proto", 3, 1), "still here")])
    }

    fn fails(_: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Err(RuleError::Internal("index out of date".to_string()))
    }

    fn panics(_: &LintContext<'_>) -> Result<Vec<Finding>, RuleError> {
        panic!("boom")
    }

    fn rule(id: &'static str, check: LintCheck) -> LintRule {
        Rule {
            id,
            purpose: "test rule",
            categories: &["TEST"],
            severity: Severity::Error,
            check,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_rules_are_isolated() {
        let rules = RuleSet::new(
            vec![rule("PANICS", panics), rule("REPORTS", reports), rule("FAILS", fails)],
            IgnoreFilter::none(),
        );

        let findings = lint(image(), &rules, &CancellationToken::new()).await.unwrap();
        let rendered: Vec<String> = findings.iter().map(|f| f.to_string()).collect();

        assert_eq!(
            rendered,
            vec![
                "RULE_INTERNAL_ERROR rule FAILS failed: index out of date",
                "RULE_INTERNAL_ERROR rule PANICS failed: boom",
                "acme/v1/a.proto:3:1:REPORTS still here",
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_run() {
        let rules = RuleSet::new(vec![rule("REPORTS", reports)], IgnoreFilter::none());
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(lint(image(), &rules, &cancel).await.unwrap_err(), EngineError::Cancelled);
    }

    #[tokio::test]
    async fn empty_rule_set_yields_nothing() {
        let rules = RuleSet::new(Vec::<LintRule>::new(), IgnoreFilter::none());
        assert!(lint(image(), &rules, &CancellationToken::new()).await.unwrap().is_empty());
    }
}
