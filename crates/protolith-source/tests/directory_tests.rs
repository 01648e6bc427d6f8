//! Integration tests for the local directory provider

use pretty_assertions::assert_eq;
use protolith_core::ModuleRef;
use protolith_source::{DirectoryProvider, SourceError, SourceProvider};
use semver::{Version, VersionReq};
use std::fs;
use std::path::Path;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        &root.join("money/module.toml"),
        "[module]\nname = \"acme/money\"\nversion = \"1.0.0\"\n",
    );
    write(&root.join("money/acme/money/v1/money.proto.json"), "{}");

    write(
        &root.join("payments/module.toml"),
        "[module]\nname = \"acme/payments\"\n\n[[dependencies]]\nname = \"acme/money\"\nversion = \"^1\"\n",
    );
    write(&root.join("payments/acme/payments/v1/payment.proto.json"), "{}");
    write(&root.join("payments/acme/payments/v1/api.proto.json"), "{}");
    write(&root.join("payments/README.md"), "not a schema");

    // Nested module: its files must not leak into acme/payments
    write(
        &root.join("payments/internal/module.toml"),
        "[module]\nname = \"acme/payments-internal\"\n",
    );
    write(&root.join("payments/internal/acme/internal/v1/x.proto.json"), "{}");

    dir
}

#[tokio::test]
async fn discovers_modules_sorted_by_name() {
    let dir = workspace();
    let provider = DirectoryProvider::open(dir.path()).unwrap();

    let names: Vec<_> = provider.modules().into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["acme/money", "acme/payments", "acme/payments-internal"]);
}

#[tokio::test]
async fn lists_syntax_files_without_extension() {
    let dir = workspace();
    let provider = DirectoryProvider::open(dir.path()).unwrap();

    let files = provider.list_files(&ModuleRef::local("acme/payments")).await.unwrap();
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["acme/payments/v1/api.proto", "acme/payments/v1/payment.proto"]
    );
}

#[tokio::test]
async fn resolves_with_version_constraint() {
    let dir = workspace();
    let provider = DirectoryProvider::open(dir.path()).unwrap();

    let module = provider
        .resolve_module("acme/money", &VersionReq::parse("^1").unwrap())
        .await
        .unwrap();
    assert_eq!(module.version, Some(Version::new(1, 0, 0)));

    let result = provider
        .resolve_module("acme/money", &VersionReq::parse("^2").unwrap())
        .await;
    assert!(matches!(result, Err(SourceError::NotFound(_))));
}

#[tokio::test]
async fn manifest_keeps_dependency_order() {
    let dir = workspace();
    let provider = DirectoryProvider::open(dir.path()).unwrap();

    let manifest = provider.manifest(&ModuleRef::local("acme/payments")).await.unwrap();
    assert_eq!(manifest.dependencies.len(), 1);
    assert_eq!(manifest.dependencies[0].name, "acme/money");
}

#[test]
fn invalid_manifest_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("broken/module.toml"), "[module\nname=");

    let result = DirectoryProvider::open(dir.path());
    assert!(matches!(result, Err(SourceError::InvalidManifest { .. })));
}

fn vendored_versions() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for version in ["1.1.0", "1.4.0"] {
        let module_root = dir.path().join(format!("money-{}", version));
        write(
            &module_root.join("module.toml"),
            &format!("[module]\nname = \"acme/money\"\nversion = \"{}\"\n", version),
        );
        write(&module_root.join(format!("acme/money/v1/money_{}.proto.json", version.replace('.', "_"))), "{}");
    }
    dir
}

#[tokio::test]
async fn keeps_every_version_of_a_vendored_module() {
    let dir = vendored_versions();
    let provider = DirectoryProvider::open(dir.path()).unwrap();

    let versions: Vec<_> = provider.modules().into_iter().map(|m| m.to_string()).collect();
    assert_eq!(versions, vec!["acme/money@1.1.0", "acme/money@1.4.0"]);

    let pinned = provider
        .resolve_module("acme/money", &VersionReq::parse("=1.1.0").unwrap())
        .await
        .unwrap();
    assert_eq!(pinned.version, Some(Version::new(1, 1, 0)));

    let highest = provider
        .resolve_module("acme/money", &VersionReq::parse("^1").unwrap())
        .await
        .unwrap();
    assert_eq!(highest.version, Some(Version::new(1, 4, 0)));

    let files = provider.list_files(&pinned).await.unwrap();
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["acme/money/v1/money_1_1_0.proto"]);
}

#[test]
fn same_module_declared_twice_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("a/module.toml"), "[module]\nname = \"acme/money\"\nversion = \"1.0.0\"\n");
    write(&dir.path().join("b/module.toml"), "[module]\nname = \"acme/money\"\nversion = \"1.0.0\"\n");

    let result = DirectoryProvider::open(dir.path());
    assert!(matches!(result, Err(SourceError::InvalidManifest { .. })));
}
