//! Bootstrap bundle builds.
//!
//! A build runs in fixed order and stops at the first phase that fails:
//!
//! 1. resolve the release, its tool, and the tool's architectures;
//! 2. check that every release package has a build for every architecture;
//! 3. snapshot the catalog from the package server;
//! 4. for each architecture, assemble a store and emit a bundle.
//!
//! Phases 1-3 fail the whole run. In phase 4 a download or emission failure
//! costs only that architecture; integrity errors still stop everything.

pub mod arches;
pub mod assemble;
pub mod emit;
pub mod error;
pub mod preflight;
pub mod snapshot;

pub use arches::resolve_target_arches;
pub use assemble::{AssembleError, AssembledStore, StoreRequest, assemble_store};
pub use emit::{BundleFormat, EmitError, bundle_name, emit_bundle};
pub use error::{BootstrapError, EXIT_CONNECTION, EXIT_FAILURE, EXIT_INTEGRITY, IntegrityError};
pub use preflight::{MissingBuild, MissingBuilds, MissingReason, check_completeness};
pub use snapshot::{ClosedSnapshot, OpenSnapshot, take_snapshot, verify_no_wal};

use std::path::{Path, PathBuf};

use bootkit_schema::{OsArch, PackageRef, ReleaseIdentity, ReleaseRecord};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::Reporter;
use crate::catalog::{Catalog, PackageServer, remote::connection_guidance};
use crate::io::download::BuildFetcher;
use crate::paths::escape_package_name;

/// Name of the top-level entry point link when none is configured.
pub const DEFAULT_LAUNCHER: &str = "tool";

/// What to build.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Release to bundle.
    pub release: ReleaseIdentity,
    /// Directory bundles are written to; created if missing.
    pub output_dir: PathBuf,
    /// Build only this architecture.
    pub target_arch: Option<OsArch>,
    /// Archive or directory output.
    pub format: BundleFormat,
    /// Name of the entry point inside the tool tree and at the store root.
    pub launcher: String,
    /// Parent for temporary stores and snapshots (system temp dir if unset).
    pub work_dir: Option<PathBuf>,
}

impl BootstrapOptions {
    /// Options with defaults for everything but the release and output.
    pub fn new(release: ReleaseIdentity, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            release,
            output_dir: output_dir.into(),
            target_arch: None,
            format: BundleFormat::default(),
            launcher: DEFAULT_LAUNCHER.to_string(),
            work_dir: None,
        }
    }
}

/// A bundle written for one architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub arch: OsArch,
    pub path: PathBuf,
}

/// Result of a fully successful run.
#[derive(Debug, Clone)]
pub struct BootstrapSummary {
    pub release: ReleaseIdentity,
    pub tool: PackageRef,
    pub bundles: Vec<Bundle>,
}

/// Runs bootstrap builds against explicit collaborators.
#[derive(Clone, Copy)]
pub struct Bootstrapper<'a> {
    catalog: &'a dyn Catalog,
    server: &'a dyn PackageServer,
    fetcher: &'a dyn BuildFetcher,
    reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for Bootstrapper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper").finish_non_exhaustive()
    }
}

impl<'a> Bootstrapper<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        server: &'a dyn PackageServer,
        fetcher: &'a dyn BuildFetcher,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            catalog,
            server,
            fetcher,
            reporter,
        }
    }

    /// Build bundles for every architecture the release's tool supports.
    pub async fn run(&self, opts: &BootstrapOptions) -> Result<BootstrapSummary, BootstrapError> {
        let (release, tool, arches) = self.resolve(opts)?;

        self.reporter.info(&format!(
            "Building bootstrap tarballs for architectures {}",
            error::join(&arches)
        ));

        // Before downloading anything, make sure the catalog has everything
        // each architecture needs.
        if let Err(missing) = check_completeness(self.catalog, &arches, &release.packages) {
            self.reporter
                .job_errors("=> Errors finding builds:", &missing.lines());
            return Err(BootstrapError::MissingBuilds(missing));
        }

        std::fs::create_dir_all(&opts.output_dir)?;

        self.reporter.section("Syncing package catalog");
        let snapshot = match take_snapshot(self.server, &opts.release, opts.work_dir.as_deref()).await
        {
            Ok(snapshot) => snapshot,
            Err(BootstrapError::Connection(err)) => {
                self.reporter.error(&connection_guidance(&err));
                return Err(BootstrapError::Connection(err));
            }
            Err(err) => return Err(err),
        };

        let prefix = format!("{}-bootstrap", escape_package_name(&tool.package));
        let mut bundles = Vec::new();
        let mut failed = Vec::new();

        for arch in &arches {
            self.reporter.section(&format!("Building bundle for {arch}"));
            match self.build_one(opts, &release, &tool, arch, &snapshot, &prefix).await {
                Ok(path) => {
                    self.reporter.emitted(arch, &path);
                    bundles.push(Bundle {
                        arch: arch.clone(),
                        path,
                    });
                }
                Err(ArchFailure::Fatal(err)) => return Err(err),
                Err(ArchFailure::Skipped(message)) => {
                    warn!(%arch, "bundle failed");
                    self.reporter.job_errors(
                        &format!("=> Errors building bundle for {arch}:"),
                        &[message],
                    );
                    failed.push(arch.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(BootstrapError::ArchitecturesFailed {
                failed,
                emitted: bundles.into_iter().map(|b| b.path).collect(),
            });
        }

        self.reporter
            .success(&format!("Built {} bootstrap bundle(s)", bundles.len()));
        Ok(BootstrapSummary {
            release: opts.release.clone(),
            tool,
            bundles,
        })
    }

    fn resolve(
        &self,
        opts: &BootstrapOptions,
    ) -> Result<(ReleaseRecord, PackageRef, Vec<OsArch>), BootstrapError> {
        let release = self
            .catalog
            .release_version(&opts.release.track, &opts.release.version)?
            .ok_or_else(|| BootstrapError::UnknownRelease(opts.release.clone()))?;

        let tool = release.tool_ref().map_err(BootstrapError::InvalidTool)?;

        let builds = self
            .catalog
            .all_builds(&tool.package, &tool.version)?
            .ok_or_else(|| BootstrapError::UnknownToolVersion(tool.clone()))?;
        if builds.is_empty() {
            return Err(BootstrapError::NoToolBuilds(tool));
        }

        let arches = resolve_target_arches(&builds, opts.target_arch.as_ref())?;
        info!(release = %opts.release, %tool, count = arches.len(), "resolved architectures");
        Ok((release, tool, arches))
    }

    async fn build_one(
        &self,
        opts: &BootstrapOptions,
        release: &ReleaseRecord,
        tool: &PackageRef,
        arch: &OsArch,
        snapshot: &ClosedSnapshot,
        prefix: &str,
    ) -> Result<PathBuf, ArchFailure> {
        let request = StoreRequest {
            arch,
            packages: &release.packages,
            snapshot,
            tool,
            launcher: &opts.launcher,
            work_dir: opts.work_dir.as_deref(),
        };

        let assembled = assemble_store(self.catalog, self.fetcher, self.reporter, request)
            .await
            .map_err(|err| match err {
                AssembleError::Integrity(e) => ArchFailure::Fatal(e.into()),
                other => ArchFailure::Skipped(other.to_string()),
            })?;

        emit_bundle(
            assembled.store().root(),
            &opts.output_dir,
            &bundle_name(prefix, arch),
            opts.format,
        )
        .map_err(|err| ArchFailure::Skipped(err.to_string()))
    }
}

enum ArchFailure {
    Fatal(BootstrapError),
    Skipped(String),
}

/// A fresh temporary directory under `work_dir`, or the system temp dir.
pub(crate) fn temp_dir(work_dir: Option<&Path>, prefix: &str) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match work_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            builder.tempdir_in(dir)
        }
        None => builder.tempdir(),
    }
}
