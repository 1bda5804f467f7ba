//! Errors for bootstrap bundle builds, grouped by how the run must end.

use std::path::PathBuf;

use bootkit_schema::{ArchError, OsArch, PackageRef, ReleaseIdentity, SchemaError};
use thiserror::Error;

use super::preflight::MissingBuilds;
use crate::catalog::{CatalogError, SyncError};

/// Exit status for input and validation failures.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when the package server cannot be reached.
pub const EXIT_CONNECTION: i32 = 2;
/// Exit status for catalog integrity violations.
pub const EXIT_INTEGRITY: i32 = 3;

/// The catalog contradicts itself. Never worked around.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("malformed build record: {0}")]
    MalformedBuildRecord(#[from] ArchError),

    #[error("Write-ahead log still exists for {} so the data file will be incomplete!", .0.display())]
    WriteAheadLogRemains(PathBuf),

    #[error("missing tool for {arch} in {tool}")]
    MissingToolBuild { tool: PackageRef, arch: OsArch },
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Release unknown: {0}")]
    UnknownRelease(ReleaseIdentity),

    #[error("bad tool in release: {0}")]
    InvalidTool(#[source] SchemaError),

    #[error("Tool version unknown: {0}")]
    UnknownToolVersion(PackageRef),

    #[error("Tool version has no builds: {0}")]
    NoToolBuilds(PackageRef),

    #[error("{requested}: the arch is not available for the release. Available arches: {available}")]
    UnsupportedArchitecture { requested: OsArch, available: String },

    /// The individual entries are reported through the reporter.
    #[error("{} package build(s) missing for the release", .0.len())]
    MissingBuilds(MissingBuilds),

    #[error("Catalog sync failed: {0}")]
    Connection(#[source] SyncError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build bundles for {}", join(.failed))]
    ArchitecturesFailed {
        failed: Vec<OsArch>,
        emitted: Vec<PathBuf>,
    },
}

impl BootstrapError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) => EXIT_CONNECTION,
            Self::Integrity(_) => EXIT_INTEGRITY,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<SyncError> for BootstrapError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Catalog(e) => Self::Catalog(e),
            other => Self::Connection(other),
        }
    }
}

pub(crate) fn join(arches: &[OsArch]) -> String {
    arches
        .iter()
        .map(OsArch::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
