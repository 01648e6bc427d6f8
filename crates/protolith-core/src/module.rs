//! Module references, manifests and content digests

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Content digest (`sha256:<hex>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Digest of raw bytes
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a module: name plus version or content digest
///
/// Workspace modules carry neither and are identified by name alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

impl ModuleRef {
    /// Unversioned workspace module
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            digest: None,
        }
    }

    pub fn versioned(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
            digest: None,
        }
    }

    pub fn pinned(name: impl Into<String>, digest: Digest) -> Self {
        Self {
            name: name.into(),
            version: None,
            digest: Some(digest),
        }
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.version, &self.digest) {
            (Some(version), _) => write!(f, "{}@{}", self.name, version),
            (None, Some(digest)) => write!(f, "{}@{}", self.name, digest),
            (None, None) => write!(f, "{}", self.name),
        }
    }
}

/// A declared dependency on another module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default = "any_version")]
    pub version: VersionReq,
}

fn any_version() -> VersionReq {
    VersionReq::STAR
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: VersionReq) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Dependency accepting any version
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, VersionReq::STAR)
    }
}

/// Module metadata (`module.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub module: ModuleRef,

    /// Dependencies in declaration order
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Older versions this module declares itself a stand-in for
    #[serde(default)]
    pub compatibility: Option<VersionReq>,
}

impl ModuleManifest {
    pub fn new(module: ModuleRef) -> Self {
        Self {
            module,
            dependencies: Vec::new(),
            compatibility: None,
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_compatibility(mut self, compatibility: VersionReq) -> Self {
        self.compatibility = Some(compatibility);
        self
    }

    /// Parse a manifest from TOML
    pub fn from_toml(toml: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let a = Digest::of(b"syntax = \"proto3\";");
        let b = Digest::of(b"syntax = \"proto3\";");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("sha256:"));
        assert_eq!(a.as_str().len(), "sha256:".len() + 64);
    }

    #[test]
    fn module_ref_display() {
        assert_eq!(ModuleRef::local("acme/api").to_string(), "acme/api");
        assert_eq!(
            ModuleRef::versioned("acme/api", Version::new(1, 2, 0)).to_string(),
            "acme/api@1.2.0"
        );
    }

    #[test]
    fn manifest_from_toml() {
        let manifest = ModuleManifest::from_toml(
            r#"
            compatibility = ">=1.0.0"

            [module]
            name = "acme/payments"
            version = "2.0.0"

            [[dependencies]]
            name = "acme/money"
            version = "^1.4"

            [[dependencies]]
            name = "acme/common"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.module.version, Some(Version::new(2, 0, 0)));
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies[1].version, VersionReq::STAR);
        assert!(manifest.compatibility.is_some());
    }
}
