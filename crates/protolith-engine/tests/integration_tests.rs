//! End-to-end tests: provider -> image -> rules -> report

use pretty_assertions::assert_eq;
use protolith_core::{CancellationToken, Dependency, ModuleRef, Report, RuleConfig, Severity};
use protolith_engine::{detect_breaking, lint, report, EngineError, RuleCatalog, ALL};
use protolith_image::{build_workspace, Image, JsonSyntaxParser, PipelineError};
use protolith_source::{MemoryModule, MemoryProvider};
use serde_json::{json, Value};
use std::sync::Arc;

fn span(line: usize) -> Value {
    json!({ "start": 0, "end": 0, "line": line, "column": 3, "end_line": line, "end_column": 40 })
}

fn money_file(with_money: bool) -> Value {
    let messages = if with_money {
        json!([{
            "name": "Money",
            "span": span(5),
            "fields": [
                { "name": "currency_code", "number": 1, "type": { "kind": "scalar", "scalar": "string" }, "span": span(6) },
                { "name": "units", "number": 2, "type": { "kind": "scalar", "scalar": "int64" }, "span": span(7) },
            ],
        }])
    } else {
        json!([])
    };
    json!({ "package": "acme.common.v1", "package_span": span(1), "messages": messages })
}

fn payment_file(amount_type: Value, imports: Value) -> Value {
    json!({
        "package": "acme.payments.v1",
        "package_span": span(1),
        "imports": imports,
        "messages": [{
            "name": "Payment",
            "span": span(6),
            "fields": [
                { "name": "amount", "number": 1, "type": amount_type, "span": span(7) },
                { "name": "id", "number": 2, "type": { "kind": "scalar", "scalar": "string" }, "span": span(8) },
            ],
        }],
    })
}

fn money_reference() -> (Value, Value) {
    (
        json!({ "kind": "named", "name": "acme.common.v1.Money" }),
        json!([{ "path": "acme/common/v1/money.proto", "span": span(3) }]),
    )
}

/// Module B (`acme/payments`) depending on module A (`acme/common`)
fn provider(money: Value, payment: Value) -> MemoryProvider {
    let bytes = |v: &Value| serde_json::to_vec(v).unwrap();

    MemoryProvider::new()
        .with_module(
            MemoryModule::local("acme/payments")
                .with_dependency(Dependency::any("acme/common"))
                .with_file("acme/payments/v1/payment.proto", bytes(&payment)),
        )
        .with_module(MemoryModule::local("acme/common").with_file("acme/common/v1/money.proto", bytes(&money)))
}

fn roots() -> Vec<ModuleRef> {
    vec![ModuleRef::local("acme/payments"), ModuleRef::local("acme/common")]
}

async fn image(provider: &MemoryProvider) -> Result<Arc<Image>, PipelineError> {
    let build = build_workspace(&roots(), provider, &JsonSyntaxParser, &CancellationToken::new()).await?;
    Ok(Arc::new(build.image))
}

async fn before() -> Arc<Image> {
    let (ty, imports) = money_reference();
    image(&provider(money_file(true), payment_file(ty, imports))).await.unwrap()
}

#[tokio::test]
async fn default_lint_is_clean_and_comments_only_warn() {
    let image = before().await;
    let catalog = RuleCatalog::builtin();
    let cancel = CancellationToken::new();

    let default = catalog.resolve_lint(&RuleConfig::default()).unwrap();
    let findings = lint(Arc::clone(&image), &default, &cancel).await.unwrap();
    assert_eq!(findings, Vec::new());

    let with_comments = catalog
        .resolve_lint(&RuleConfig::using(["DEFAULT", "COMMENTS"]))
        .unwrap();
    let findings = report(
        lint(image, &with_comments, &cancel).await.unwrap(),
        with_comments.filter(),
    );

    let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "COMMENT_MESSAGE",
            "COMMENT_FIELD",
            "COMMENT_FIELD",
            "COMMENT_MESSAGE",
            "COMMENT_FIELD",
            "COMMENT_FIELD",
        ]
    );
    assert!(findings.iter().all(|f| f.severity == Severity::Warn));
    assert_eq!(Report::from_findings(findings).exit_code(), 0);
}

#[tokio::test]
async fn lint_ignore_globs_suppress_findings() {
    let image = before().await;
    let config = RuleConfig::using(["COMMENTS"]).with_ignore_only("COMMENT_FIELD", "acme/common/**");
    let rules = RuleCatalog::builtin().resolve_lint(&config).unwrap();

    let findings = report(
        lint(image, &rules, &CancellationToken::new()).await.unwrap(),
        rules.filter(),
    );

    let rendered: Vec<String> = findings.iter().map(|f| f.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "acme/common/v1/money.proto:5:3:COMMENT_MESSAGE Message \"Money\" should have a non-empty comment for documentation",
            "acme/payments/v1/payment.proto:6:3:COMMENT_MESSAGE Message \"Payment\" should have a non-empty comment for documentation",
            "acme/payments/v1/payment.proto:7:3:COMMENT_FIELD Field \"amount\" should have a non-empty comment for documentation",
            "acme/payments/v1/payment.proto:8:3:COMMENT_FIELD Field \"id\" should have a non-empty comment for documentation",
        ]
    );
}

#[tokio::test]
async fn deleting_a_referenced_message_fails_the_new_build_once() {
    let (ty, imports) = money_reference();
    let err = image(&provider(money_file(false), payment_file(ty, imports)))
        .await
        .unwrap_err();

    match err {
        PipelineError::Build(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors.errors[0].location().to_string(),
                "acme/payments/v1/payment.proto:7:3"
            );
        }
        other => panic!("expected build error, got {:?}", other),
    }
}

#[tokio::test]
async fn deleted_message_and_retyped_field_are_breaking() {
    let before = before().await;
    let after = image(&provider(
        money_file(false),
        payment_file(json!({ "kind": "scalar", "scalar": "int64" }), json!([])),
    ))
    .await
    .unwrap();

    let rules = RuleCatalog::builtin()
        .resolve_breaking(&RuleConfig::using([ALL]))
        .unwrap();
    let findings = report(
        detect_breaking(before, after, &rules, &CancellationToken::new()).await.unwrap(),
        rules.filter(),
    );

    let summary: Vec<(String, String, String)> = findings
        .iter()
        .map(|f| {
            (
                f.rule_id.clone(),
                f.location.as_ref().unwrap().to_string(),
                f.against.as_ref().unwrap().to_string(),
            )
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            (
                "MESSAGE_NO_DELETE".to_string(),
                "acme/common/v1/money.proto".to_string(),
                "acme/common/v1/money.proto:5:3".to_string(),
            ),
            (
                "FIELD_SAME_TYPE".to_string(),
                "acme/payments/v1/payment.proto:7:3".to_string(),
                "acme/payments/v1/payment.proto:7:3".to_string(),
            ),
        ]
    );
    assert_eq!(Report::from_findings(findings).exit_code(), 1);
}

#[tokio::test]
async fn unchanged_images_have_no_breaking_changes() {
    let rules = RuleCatalog::builtin()
        .resolve_breaking(&RuleConfig::using([ALL]))
        .unwrap();

    let findings = detect_breaking(before().await, before().await, &rules, &CancellationToken::new())
        .await
        .unwrap();
    assert!(findings.is_empty());
}

#[tokio::test]
async fn cancelled_breaking_run_returns_cancelled() {
    let rules = RuleCatalog::builtin().resolve_breaking(&RuleConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = detect_breaking(before().await, before().await, &rules, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}
