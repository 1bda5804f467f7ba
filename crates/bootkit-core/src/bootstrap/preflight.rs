//! Completeness check run before any network work.

use std::collections::BTreeMap;
use std::fmt;

use bootkit_schema::{OsArch, PackageRef};
use tracing::debug;

use crate::catalog::Catalog;

/// Why a (package, architecture) pair failed the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// The catalog has no build supporting the architecture.
    NoBuild,
    /// The catalog query itself failed.
    Lookup(String),
}

/// A package version unusable on one architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBuild {
    pub arch: OsArch,
    pub package: PackageRef,
    pub reason: MissingReason,
}

impl MissingBuild {
    /// Label of the job that found the problem.
    pub fn job(&self) -> String {
        format!("looking up {} on {}", self.package, self.arch)
    }
}

impl fmt::Display for MissingBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            MissingReason::NoBuild => write!(
                f,
                "{}: missing build of {} for {}",
                self.job(),
                self.package,
                self.arch
            ),
            MissingReason::Lookup(err) => write!(f, "{}: {err}", self.job()),
        }
    }
}

/// Accumulates every missing build found during one check.
#[derive(Debug, Clone, Default)]
pub struct MissingBuilds {
    entries: Vec<MissingBuild>,
}

impl MissingBuilds {
    /// Record one problem.
    pub fn record(&mut self, arch: &OsArch, package: PackageRef, reason: MissingReason) {
        self.entries.push(MissingBuild {
            arch: arch.clone(),
            package,
            reason,
        });
    }

    /// No problems recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of problems recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Problems in the order they were found.
    pub fn iter(&self) -> impl Iterator<Item = &MissingBuild> {
        self.entries.iter()
    }

    /// One printable line per problem.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for MissingBuilds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// Confirm that every package in `packages` has a build for every one of
/// `arches`.
///
/// All pairs are checked; the error carries the full list.
pub fn check_completeness(
    catalog: &dyn Catalog,
    arches: &[OsArch],
    packages: &BTreeMap<String, String>,
) -> Result<(), MissingBuilds> {
    let mut missing = MissingBuilds::default();

    for arch in arches {
        for (name, version) in packages {
            let package = PackageRef::new(name, version);
            match catalog.builds_for_arches(name, version, std::slice::from_ref(arch)) {
                Ok(Some(_)) => {}
                Ok(None) => missing.record(arch, package, MissingReason::NoBuild),
                Err(err) => missing.record(arch, package, MissingReason::Lookup(err.to_string())),
            }
        }
    }

    debug!(
        checked = arches.len() * packages.len(),
        missing = missing.len(),
        "completeness check"
    );

    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}
