//! Integration tests for declaration trees, the image builder and the pipeline

use pretty_assertions::assert_eq;
use protolith_core::{CancellationToken, Dependency, Digest, Location, ModuleManifest, ModuleRef, SyntaxFile};
use protolith_graph::ModuleGraph;
use protolith_image::{
    build, build_workspace, BuildError, DeclKind, DeclarationTree, FieldType, FileId, Image, JsonSyntaxParser,
};
use protolith_source::{MemoryModule, MemoryProvider};
use semver::{Version, VersionReq};
use serde_json::{json, Value};
use std::collections::BTreeMap;

// ---- syntax fixtures ----

fn span(line: usize) -> Value {
    json!({ "start": 0, "end": 0, "line": line, "column": 3, "end_line": line, "end_column": 40 })
}

fn scalar(name: &str, number: i32, scalar: &str, line: usize) -> Value {
    json!({ "name": name, "number": number, "type": { "kind": "scalar", "scalar": scalar }, "span": span(line) })
}

fn named(name: &str, number: i32, ty: &str, line: usize) -> Value {
    json!({ "name": name, "number": number, "type": { "kind": "named", "name": ty }, "span": span(line) })
}

fn message(name: &str, fields: Vec<Value>, line: usize) -> Value {
    json!({ "name": name, "fields": fields, "span": span(line) })
}

fn import(path: &str, public: bool) -> Value {
    json!({ "path": path, "public": public, "span": span(3) })
}

fn file(package: &str, imports: Vec<Value>, messages: Vec<Value>) -> Value {
    json!({ "package": package, "package_span": span(1), "imports": imports, "messages": messages })
}

fn money_file() -> Value {
    file(
        "acme.common.v1",
        vec![],
        vec![message(
            "Money",
            vec![scalar("currency_code", 1, "string", 6), scalar("units", 2, "int64", 7)],
            5,
        )],
    )
}

fn payment_file(imports: Vec<Value>) -> Value {
    file(
        "acme.payments.v1",
        imports,
        vec![message(
            "Payment",
            vec![named("amount", 1, "acme.common.v1.Money", 7), scalar("id", 2, "string", 8)],
            6,
        )],
    )
}

// ---- direct builder fixtures ----

/// Modules with their files, built into a graph without a provider
struct Fixture {
    roots: Vec<String>,
    manifests: BTreeMap<String, ModuleManifest>,
    trees: BTreeMap<FileId, DeclarationTree>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            roots: Vec::new(),
            manifests: BTreeMap::new(),
            trees: BTreeMap::new(),
        }
    }

    fn root(mut self, name: &str, deps: &[&str]) -> Self {
        self.roots.push(name.to_string());
        self.module(name, deps)
    }

    fn module(mut self, name: &str, deps: &[&str]) -> Self {
        let mut manifest = ModuleManifest::new(ModuleRef::local(name));
        for dep in deps {
            manifest = manifest.with_dependency(Dependency::any(*dep));
        }
        self.manifests.insert(name.to_string(), manifest);
        self
    }

    fn file(self, module: &str, path: &str, syntax: Value) -> Self {
        self.file_of(ModuleRef::local(module), path, syntax)
    }

    fn file_of(mut self, module: ModuleRef, path: &str, syntax: Value) -> Self {
        let bytes = serde_json::to_vec(&syntax).unwrap();
        let parsed = SyntaxFile::from_json(&bytes).unwrap();
        let id = FileId::new(module, path);
        self.trees
            .insert(id.clone(), DeclarationTree::build(id, Digest::of(&bytes), &parsed));
        self
    }

    fn build(self) -> Result<Image, Vec<BuildError>> {
        let graph = ModuleGraph::from_manifests(&self.roots, self.manifests, Vec::new()).unwrap();
        build(&graph, self.trees).map_err(|e| e.errors)
    }
}

fn payments_fixture(payment: Value) -> Fixture {
    Fixture::new()
        .root("acme/payments", &["acme/common"])
        .module("acme/common", &[])
        .file("acme/common", "acme/common/v1/money.proto", money_file())
        .file("acme/payments", "acme/payments/v1/payment.proto", payment)
}

#[test]
fn binds_reference_across_modules() {
    let image = payments_fixture(payment_file(vec![import("acme/common/v1/money.proto", false)]))
        .build()
        .unwrap();

    let paths: Vec<&str> = image.files().iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["acme/common/v1/money.proto", "acme/payments/v1/payment.proto"]);
    assert!(image.file("acme/common/v1/money.proto").unwrap().is_import);
    assert!(!image.file("acme/payments/v1/payment.proto").unwrap().is_import);

    let (_, amount) = image.lookup("acme.payments.v1.Payment.amount").unwrap();
    let reference = amount.references()[0].clone();
    assert_eq!(reference.target.as_deref(), Some("acme.common.v1.Money"));

    let (file, target) = image.resolve(&reference).unwrap();
    assert_eq!(file.path, "acme/common/v1/money.proto");
    assert_eq!(target.kind, DeclKind::Message);
}

#[test]
fn deleted_dependency_type_is_unresolved_at_the_referencing_field() {
    let errors = Fixture::new()
        .root("acme/payments", &["acme/common"])
        .module("acme/common", &[])
        .file("acme/common", "acme/common/v1/money.proto", file("acme.common.v1", vec![], vec![]))
        .file(
            "acme/payments",
            "acme/payments/v1/payment.proto",
            payment_file(vec![import("acme/common/v1/money.proto", false)]),
        )
        .build()
        .unwrap_err();

    assert_eq!(errors.len(), 1);
    match &errors[0] {
        BuildError::UnresolvedType { name, location, hint } => {
            assert_eq!(name, "acme.common.v1.Money");
            assert_eq!(location.to_string(), "acme/payments/v1/payment.proto:7:3");
            assert_eq!(hint, &None);
        }
        other => panic!("expected unresolved type, got {:?}", other),
    }
}

#[test]
fn type_from_unimported_file_is_hinted() {
    let errors = payments_fixture(payment_file(vec![])).build().unwrap_err();

    assert_eq!(errors.len(), 1);
    let message = errors[0].to_string();
    assert!(message.contains("unresolved type acme.common.v1.Money"), "{}", message);
    assert!(message.contains("which is not imported"), "{}", message);
}

#[test]
fn public_imports_are_visible_transitively() {
    let image = Fixture::new()
        .root("acme/payments", &["acme/common"])
        .module("acme/common", &[])
        .file("acme/common", "acme/common/v1/money.proto", money_file())
        .file(
            "acme/common",
            "acme/common/v1/all.proto",
            file("acme.common.v1", vec![import("acme/common/v1/money.proto", true)], vec![]),
        )
        .file(
            "acme/payments",
            "acme/payments/v1/payment.proto",
            payment_file(vec![import("acme/common/v1/all.proto", false)]),
        )
        .build()
        .unwrap();

    let imported: Vec<&str> = image
        .imported_files("acme/payments/v1/payment.proto")
        .iter()
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(imported, vec!["acme/common/v1/all.proto", "acme/common/v1/money.proto"]);
}

#[test]
fn nested_types_bind_innermost_first() {
    let outer = json!({
        "name": "Order",
        "fields": [named("line", 1, "Line", 4)],
        "messages": [message("Line", vec![scalar("sku", 1, "string", 6)], 5)],
        "span": span(3),
    });
    let image = Fixture::new()
        .root("acme/orders", &[])
        .file(
            "acme/orders",
            "acme/orders/v1/order.proto",
            file("acme.orders.v1", vec![], vec![outer, message("Line", vec![], 9)]),
        )
        .build()
        .unwrap();

    let (_, line) = image.lookup("acme.orders.v1.Order.line").unwrap();
    assert_eq!(line.references()[0].target.as_deref(), Some("acme.orders.v1.Order.Line"));
}

#[test]
fn closer_module_shadows_same_path() {
    let image = Fixture::new()
        .root("acme/app", &["acme/vendor"])
        .module("acme/vendor", &[])
        .file("acme/vendor", "shared/types.proto", file("vendor", vec![], vec![]))
        .file("acme/app", "shared/types.proto", file("app", vec![], vec![]))
        .build()
        .unwrap();

    assert_eq!(image.len(), 1);
    let shared = image.file("shared/types.proto").unwrap();
    assert_eq!(shared.module, ModuleRef::local("acme/app"));
    assert_eq!(shared.package.as_deref(), Some("app"));
}

#[test]
fn files_of_another_version_of_a_graph_module_are_ignored() {
    let image = payments_fixture(payment_file(vec![import("acme/common/v1/money.proto", false)]))
        .file_of(
            ModuleRef::versioned("acme/common", Version::new(2, 0, 0)),
            "acme/common/v2/money.proto",
            file("acme.common.v2", vec![], vec![message("Money", vec![], 3)]),
        )
        .build()
        .unwrap();

    assert_eq!(image.len(), 2);
    assert!(image.file("acme/common/v2/money.proto").is_none());
    assert!(image.lookup("acme.common.v2.Money").is_none());
}

#[test]
fn tied_distance_with_different_content_conflicts() {
    let errors = Fixture::new()
        .root("acme/app", &["acme/left", "acme/right"])
        .module("acme/left", &[])
        .module("acme/right", &[])
        .file("acme/left", "shared/types.proto", file("left", vec![], vec![]))
        .file("acme/right", "shared/types.proto", file("right", vec![], vec![]))
        .build()
        .unwrap_err();

    assert_eq!(
        errors,
        vec![BuildError::ConflictingFile {
            path: "shared/types.proto".to_string(),
            first: "acme/left".to_string(),
            second: "acme/right".to_string(),
        }]
    );
}

#[test]
fn tied_distance_with_identical_content_is_deduplicated() {
    let image = Fixture::new()
        .root("acme/app", &["acme/left", "acme/right"])
        .module("acme/left", &[])
        .module("acme/right", &[])
        .file("acme/left", "shared/types.proto", file("shared", vec![], vec![]))
        .file("acme/right", "shared/types.proto", file("shared", vec![], vec![]))
        .build()
        .unwrap();

    assert_eq!(image.len(), 1);
}

#[test]
fn duplicate_names_across_files_are_fatal() {
    let errors = Fixture::new()
        .root("acme/app", &[])
        .file("acme/app", "a.proto", file("acme", vec![], vec![message("User", vec![], 4)]))
        .file("acme/app", "b.proto", file("acme", vec![], vec![message("User", vec![], 9)]))
        .build()
        .unwrap_err();

    assert_eq!(
        errors,
        vec![BuildError::DuplicateDeclaration {
            name: "acme.User".to_string(),
            location: Location::from_span("b.proto", &protolith_core::Span {
                line: 9,
                column: 3,
                end_line: 9,
                end_column: 40,
                ..Default::default()
            }),
            previous: Location::from_span("a.proto", &protolith_core::Span {
                line: 4,
                column: 3,
                end_line: 4,
                end_column: 40,
                ..Default::default()
            }),
        }]
    );
}

#[test]
fn structural_checks_collect_every_error() {
    let user = json!({
        "name": "User",
        "fields": [
            scalar("id", 1, "string", 5),
            scalar("email", 1, "string", 6),
            scalar("legacy", 4, "string", 7),
            scalar("zero", 0, "string", 8),
        ],
        "reserved": [{ "start": 4, "end": 6 }],
        "span": span(4),
    });
    let status = json!({
        "name": "Status",
        "values": [
            { "name": "STATUS_UNSPECIFIED", "number": 0, "span": span(11) },
            { "name": "STATUS_UNKNOWN", "number": 0, "span": span(12) },
        ],
        "span": span(10),
    });
    let syntax = json!({ "package": "acme", "messages": [user], "enums": [status] });

    let errors = Fixture::new()
        .root("acme/app", &[])
        .file("acme/app", "user.proto", syntax)
        .build()
        .unwrap_err();

    let kinds: Vec<String> = errors
        .iter()
        .map(|e| match e {
            BuildError::DuplicateFieldNumber { .. } => "duplicate-field-number",
            BuildError::ReservedNumber { .. } => "reserved-number",
            BuildError::InvalidFieldNumber { .. } => "invalid-field-number",
            BuildError::DuplicateEnumNumber { .. } => "duplicate-enum-number",
            _ => "other",
        })
        .map(String::from)
        .collect();
    assert_eq!(
        kinds,
        vec![
            "duplicate-field-number",
            "reserved-number",
            "invalid-field-number",
            "duplicate-enum-number"
        ]
    );
}

#[test]
fn allow_alias_permits_shared_enum_numbers() {
    let status = json!({
        "name": "Status",
        "values": [
            { "name": "STATUS_UNSPECIFIED", "number": 0 },
            { "name": "STATUS_UNKNOWN", "number": 0 },
        ],
        "options": [{ "name": "allow_alias", "value": "true" }],
    });

    let image = Fixture::new()
        .root("acme/app", &[])
        .file("acme/app", "status.proto", json!({ "package": "acme", "enums": [status] }))
        .build()
        .unwrap();

    assert!(image.lookup("acme.STATUS_UNKNOWN").is_some());
}

#[test]
fn enum_field_and_map_values_bind() {
    let syntax = json!({
        "package": "acme",
        "enums": [{ "name": "Kind", "values": [{ "name": "KIND_UNSPECIFIED", "number": 0 }] }],
        "messages": [{
            "name": "Index",
            "fields": [
                { "name": "kind", "number": 1, "type": { "kind": "named", "name": "Kind" } },
                { "name": "by_id", "number": 2, "type": {
                    "kind": "map", "key": "string", "value": { "kind": "named", "name": ".acme.Kind" }
                } },
            ],
        }],
    });

    let image = Fixture::new()
        .root("acme/app", &[])
        .file("acme/app", "index.proto", syntax)
        .build()
        .unwrap();

    let (_, by_id) = image.lookup("acme.Index.by_id").unwrap();
    match &by_id.detail {
        protolith_image::DeclDetail::Field { ty, .. } => {
            assert_eq!(ty.to_string(), "map<string, acme.Kind>");
            assert!(matches!(ty, FieldType::Map { .. }));
        }
        other => panic!("expected field, got {:?}", other),
    }
}

#[test]
fn rpc_input_must_be_a_message() {
    let syntax = json!({
        "package": "acme",
        "enums": [{ "name": "Kind", "values": [{ "name": "KIND_UNSPECIFIED", "number": 0 }] }],
        "messages": [{ "name": "Reply" }],
        "services": [{
            "name": "KindService",
            "methods": [{ "name": "Get", "input": "Kind", "output": "Reply", "span": span(9) }],
        }],
    });

    let errors = Fixture::new()
        .root("acme/app", &[])
        .file("acme/app", "svc.proto", syntax)
        .build()
        .unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("acme.Kind is a enum, not a message"));
}

#[test]
fn missing_import_is_reported() {
    let errors = Fixture::new()
        .root("acme/app", &[])
        .file(
            "acme/app",
            "a.proto",
            file("acme", vec![import("missing/file.proto", false)], vec![]),
        )
        .build()
        .unwrap_err();

    assert_eq!(
        errors[0],
        BuildError::UnresolvedImport {
            path: "missing/file.proto".to_string(),
            location: Location::from_span("a.proto", &protolith_core::Span {
                line: 3,
                column: 3,
                end_line: 3,
                end_column: 40,
                ..Default::default()
            }),
        }
    );
}

// ---- pipeline ----

fn provider(money: Value, common_version: Version) -> MemoryProvider {
    let bytes = |v: &Value| serde_json::to_vec(v).unwrap();

    MemoryProvider::new()
        .with_module(
            MemoryModule::local("acme/payments")
                .with_dependency(Dependency::new("acme/common", VersionReq::parse("^1").unwrap()))
                .with_file(
                    "acme/payments/v1/payment.proto",
                    bytes(&payment_file(vec![import("acme/common/v1/money.proto", false)])),
                ),
        )
        .with_module(
            MemoryModule::versioned("acme/common", common_version).with_file("acme/common/v1/money.proto", bytes(&money)),
        )
}

#[tokio::test]
async fn pipeline_builds_image_from_provider() {
    let provider = provider(money_file(), Version::new(1, 0, 0));

    let build = build_workspace(
        &[ModuleRef::local("acme/payments")],
        &provider,
        &JsonSyntaxParser,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(build.warnings().is_empty());
    assert_eq!(build.image.len(), 2);
    assert_eq!(
        build.image.file("acme/common/v1/money.proto").unwrap().module,
        ModuleRef::versioned("acme/common", Version::new(1, 0, 0))
    );
}

#[tokio::test]
async fn pipeline_output_is_deterministic_across_fetch_order() {
    let roots = [ModuleRef::local("acme/payments")];
    let cancel = CancellationToken::new();

    let slow_root = provider(money_file(), Version::new(1, 0, 0)).with_latency("acme/payments", 20);
    let slow_dep = provider(money_file(), Version::new(1, 0, 0)).with_latency("acme/common", 20);

    let first = build_workspace(&roots, &slow_root, &JsonSyntaxParser, &cancel).await.unwrap();
    let second = build_workspace(&roots, &slow_dep, &JsonSyntaxParser, &cancel).await.unwrap();

    assert_eq!(first.image.to_json().unwrap(), second.image.to_json().unwrap());
}

#[tokio::test]
async fn pipeline_reports_deleted_type() {
    let provider = provider(file("acme.common.v1", vec![], vec![]), Version::new(1, 1, 0));

    let err = build_workspace(
        &[ModuleRef::local("acme/payments")],
        &provider,
        &JsonSyntaxParser,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        protolith_image::PipelineError::Build(errors) => {
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
async fn cancelled_pipeline_returns_no_image() {
    let provider = provider(money_file(), Version::new(1, 0, 0));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = build_workspace(&[ModuleRef::local("acme/payments")], &provider, &JsonSyntaxParser, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
}
