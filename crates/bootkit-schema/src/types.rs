use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::arch::{ArchError, BuildArchitectures, OsArch};

/// Track used when a release is named by version alone.
pub const DEFAULT_TRACK: &str = "STABLE";

/// Errors produced while parsing user or catalog supplied identifiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A `name@version` string is malformed.
    #[error("invalid package reference {0:?}: expected NAME@VERSION")]
    InvalidPackageRef(String),

    /// A `TRACK@VERSION` string is malformed.
    #[error("invalid release name {0:?}: expected TRACK@VERSION")]
    InvalidRelease(String),
}

/// A package pinned to an exact version, written `name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageRef {
    /// Package name (may contain a `:` namespace separator).
    pub package: String,
    /// Exact version.
    pub version: String,
}

impl PackageRef {
    /// Build a reference from its two halves.
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.version)
    }
}

impl FromStr for PackageRef {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((package, version))
                if !package.is_empty() && !version.is_empty() && !version.contains('@') =>
            {
                Ok(Self::new(package, version))
            }
            _ => Err(SchemaError::InvalidPackageRef(s.to_string())),
        }
    }
}

/// A release track and version, e.g. `STABLE@1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseIdentity {
    /// Release track (channel).
    pub track: String,
    /// Version within the track.
    pub version: String,
}

impl ReleaseIdentity {
    /// Build an identity from its two halves.
    pub fn new(track: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            track: track.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ReleaseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.track, self.version)
    }
}

impl FromStr for ReleaseIdentity {
    type Err = SchemaError;

    /// Parses `TRACK@VERSION`; a bare `VERSION` lands on [`DEFAULT_TRACK`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (track, version) = s.split_once('@').unwrap_or((DEFAULT_TRACK, s));
        if track.is_empty() || version.is_empty() || version.contains('@') {
            return Err(SchemaError::InvalidRelease(s.to_string()));
        }
        Ok(Self::new(track, version))
    }
}

/// A release as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    /// Release track.
    pub track: String,
    /// Release version.
    pub version: String,
    /// Build tool, as `name@version`.
    pub tool: String,
    /// Every package the release pins, name to exact version.
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
    /// Whether this release is the recommended one on its track.
    #[serde(default)]
    pub recommended: bool,
}

impl ReleaseRecord {
    /// Identity of this release.
    pub fn identity(&self) -> ReleaseIdentity {
        ReleaseIdentity::new(&self.track, &self.version)
    }

    /// The tool package reference.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidPackageRef`] when the stored tool string
    /// is not `name@version`.
    pub fn tool_ref(&self) -> Result<PackageRef, SchemaError> {
        self.tool.parse()
    }
}

/// One build of a package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    /// Package name.
    pub package: String,
    /// Package version.
    pub version: String,
    /// Composite `+`-joined architecture identifier.
    pub build_architectures: String,
    /// Download URL of the build's `.tar.gz` payload.
    pub url: String,
    /// Hex SHA-256 of the payload.
    pub sha256: String,
}

impl BuildRecord {
    /// Parsed form of [`build_architectures`](Self::build_architectures).
    ///
    /// # Errors
    ///
    /// Returns an [`ArchError`] if the identifier has an empty component.
    pub fn architectures(&self) -> Result<BuildArchitectures, ArchError> {
        BuildArchitectures::parse(&self.build_architectures)
    }

    /// Package reference of this build.
    pub fn package_ref(&self) -> PackageRef {
        PackageRef::new(&self.package, &self.version)
    }
}

/// Name of the manifest file at the root of every installed build.
pub const BUILD_MANIFEST_FILE: &str = "manifest.json";

/// Build manifest shipped inside a package payload.
///
/// Tool packages list, per architecture, where the tool's files live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Tool trees on disk, one per architecture.
    #[serde(default)]
    pub tools: Vec<ToolOnDisk>,
}

impl BuildManifest {
    /// Record for an exact architecture tag.
    pub fn tool_for(&self, arch: &OsArch) -> Option<&ToolOnDisk> {
        self.tools.iter().find(|t| t.arch == arch.as_str())
    }
}

/// Location of a tool tree within a package build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOnDisk {
    /// Architecture tag the tree was built for.
    pub arch: String,
    /// Path relative to the package directory.
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_ref_parses_name_and_version() {
        let r: PackageRef = "tool@1.2.3".parse().unwrap();
        assert_eq!(r, PackageRef::new("tool", "1.2.3"));
        assert_eq!(r.to_string(), "tool@1.2.3");
    }

    #[test]
    fn package_ref_keeps_namespace() {
        let r: PackageRef = "acme:http@0.1.0".parse().unwrap();
        assert_eq!(r.package, "acme:http");
    }

    #[test]
    fn package_ref_rejects_malformed() {
        for bad in ["tool", "@1.0", "tool@", "a@b@c", ""] {
            assert_eq!(
                bad.parse::<PackageRef>(),
                Err(SchemaError::InvalidPackageRef(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn release_identity_with_track() {
        let r: ReleaseIdentity = "STABLE@1.0".parse().unwrap();
        assert_eq!(r, ReleaseIdentity::new("STABLE", "1.0"));
    }

    #[test]
    fn release_identity_defaults_track() {
        let r: ReleaseIdentity = "2.1".parse().unwrap();
        assert_eq!(r.track, DEFAULT_TRACK);
        assert_eq!(r.version, "2.1");
    }

    #[test]
    fn release_identity_rejects_empty_halves() {
        assert!("@1.0".parse::<ReleaseIdentity>().is_err());
        assert!("STABLE@".parse::<ReleaseIdentity>().is_err());
        assert!("".parse::<ReleaseIdentity>().is_err());
    }

    #[test]
    fn release_record_json_shape() {
        let json = r#"{
            "track": "STABLE",
            "version": "1.0",
            "tool": "tool@1.0.0",
            "packages": {"tool": "1.0.0", "http": "0.3.1"}
        }"#;
        let record: ReleaseRecord = serde_json::from_str(json).unwrap();
        assert!(!record.recommended);
        assert_eq!(record.tool_ref().unwrap(), PackageRef::new("tool", "1.0.0"));
        assert_eq!(record.packages.len(), 2);
    }

    #[test]
    fn manifest_finds_exact_arch() {
        let manifest: BuildManifest = serde_json::from_str(
            r#"{"tools": [
                {"arch": "os.linux.x86_64", "path": "tools/linux"},
                {"arch": "os.osx.arm64", "path": "tools/osx"}
            ]}"#,
        )
        .unwrap();
        let osx: OsArch = "os.osx.arm64".parse().unwrap();
        let win: OsArch = "os.windows.x86_64".parse().unwrap();
        assert_eq!(manifest.tool_for(&osx).unwrap().path, "tools/osx");
        assert!(manifest.tool_for(&win).is_none());
    }
}
