//! Per-architecture store assembly.

use std::collections::BTreeMap;
use std::path::Path;

use bootkit_schema::{OsArch, PackageRef};
use tempfile::TempDir;
use thiserror::Error;
use tracing::info;

use super::error::IntegrityError;
use super::snapshot::ClosedSnapshot;
use crate::Reporter;
use crate::catalog::Catalog;
use crate::io::download::BuildFetcher;
use crate::io::fs::copy_file;
use crate::paths::STORE_DIR;
use crate::store::{DownloadFailures, PackageStore, StoreError, StoreOptions};

/// Why one architecture's store could not be assembled.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Errors downloading packages:\n{0}")]
    Download(DownloadFailures),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

/// Everything needed to assemble one architecture's store.
#[derive(Debug, Clone, Copy)]
pub struct StoreRequest<'a> {
    pub arch: &'a OsArch,
    pub packages: &'a BTreeMap<String, String>,
    pub snapshot: &'a ClosedSnapshot,
    pub tool: &'a PackageRef,
    pub launcher: &'a str,
    pub work_dir: Option<&'a Path>,
}

/// A complete store in a temporary root that is removed on drop.
#[derive(Debug)]
pub struct AssembledStore {
    _tmp: TempDir,
    store: PackageStore,
}

impl AssembledStore {
    /// The populated store.
    pub fn store(&self) -> &PackageStore {
        &self.store
    }
}

/// Build an isolated store for `req.arch`: download the release's packages,
/// install the catalog snapshot and link the tool's entry point.
pub async fn assemble_store(
    catalog: &dyn Catalog,
    fetcher: &dyn BuildFetcher,
    reporter: &dyn Reporter,
    req: StoreRequest<'_>,
) -> Result<AssembledStore, AssembleError> {
    let tmp = super::temp_dir(req.work_dir, "bootkit-store-")?;

    let options = StoreOptions {
        platform: Some(req.arch.platform()),
    };
    let store = PackageStore::new(&tmp.path().join(STORE_DIR), options)?;

    store
        .download_missing(
            catalog,
            fetcher,
            req.packages,
            std::slice::from_ref(req.arch),
            reporter,
        )
        .await
        .map_err(AssembleError::Download)?;

    // The snapshot was verified WAL-free when closed, so the main file is
    // all there is to copy.
    copy_file(req.snapshot.path(), &store.metadata_path())?;

    let manifest = store.load_manifest(&req.tool.package, &req.tool.version)?;
    let tool = manifest
        .tool_for(req.arch)
        .ok_or_else(|| IntegrityError::MissingToolBuild {
            tool: req.tool.clone(),
            arch: req.arch.clone(),
        })?;

    let entry = store
        .relative_package_path(&req.tool.package, &req.tool.version)
        .join(&tool.path)
        .join(req.launcher);
    store.link_entry_point(req.launcher, &entry)?;

    info!(arch = %req.arch, root = %store.root().display(), "store assembled");
    Ok(AssembledStore { _tmp: tmp, store })
}
