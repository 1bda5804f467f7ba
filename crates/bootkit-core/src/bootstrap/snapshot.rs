//! Catalog snapshots shipped inside bundles.
//!
//! ```text
//! OpenSnapshot --[sync()]--> --[pin()]--> --[close()]--> ClosedSnapshot
//! ```
//!
//! Only a [`ClosedSnapshot`] can be installed into a store, and one is only
//! produced after the write-ahead log has been verified gone.

use std::path::{Path, PathBuf};

use bootkit_schema::ReleaseIdentity;
use tempfile::TempDir;
use tracing::info;

use super::error::{BootstrapError, IntegrityError};
use crate::catalog::{CatalogDb, CatalogError, PackageServer, SyncError, sync_from_remote};
use crate::paths::{CATALOG_FILE, wal_path};

/// A fresh, writable catalog file in its own temporary directory.
#[derive(Debug)]
pub struct OpenSnapshot {
    // Declared first so the connection closes before the directory goes.
    db: CatalogDb,
    dir: TempDir,
}

impl OpenSnapshot {
    /// Allocate an empty snapshot under `work_dir` (or the system temp dir).
    pub fn create(work_dir: Option<&Path>) -> Result<Self, BootstrapError> {
        let dir = super::temp_dir(work_dir, "bootkit-catalog-")?;
        let db = CatalogDb::open(&dir.path().join(CATALOG_FILE))?;
        Ok(Self { db, dir })
    }

    /// Path of the catalog file.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Pull the full catalog from the server.
    pub async fn sync(&self, server: &dyn PackageServer) -> Result<usize, SyncError> {
        sync_from_remote(&self.db, server, None).await
    }

    /// Mark `release` recommended inside the snapshot.
    ///
    /// Bundles are built for releases about to be recommended; without this,
    /// a freshly installed bundle would consider an older release the latest
    /// until its first sync.
    pub fn pin(&self, release: &ReleaseIdentity) -> Result<(), CatalogError> {
        self.db
            .force_recommend_release(&release.track, &release.version)
    }

    /// Close the catalog for good and check that the file is self-contained.
    pub fn close(self) -> Result<ClosedSnapshot, BootstrapError> {
        let path = self.db.path().to_path_buf();
        self.db.close_permanently()?;
        verify_no_wal(&path)?;
        Ok(ClosedSnapshot {
            _dir: self.dir,
            path,
        })
    }
}

/// A consistent catalog file, safe to copy into any number of stores.
#[derive(Debug)]
pub struct ClosedSnapshot {
    _dir: TempDir,
    path: PathBuf,
}

impl ClosedSnapshot {
    /// Path of the closed catalog file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fail if SQLite left a `-wal` file beside `db`.
///
/// A leftover log holds transactions the main file lacks; copying the main
/// file alone would ship an incomplete catalog.
pub fn verify_no_wal(db: &Path) -> Result<(), IntegrityError> {
    if wal_path(db).exists() {
        return Err(IntegrityError::WriteAheadLogRemains(db.to_path_buf()));
    }
    Ok(())
}

/// Create, sync, pin and close a snapshot for `release`.
pub async fn take_snapshot(
    server: &dyn PackageServer,
    release: &ReleaseIdentity,
    work_dir: Option<&Path>,
) -> Result<ClosedSnapshot, BootstrapError> {
    let snapshot = OpenSnapshot::create(work_dir)?;
    let pages = snapshot.sync(server).await?;
    snapshot.pin(release)?;
    let closed = snapshot.close()?;
    info!(pages, path = %closed.path().display(), "catalog snapshot ready");
    Ok(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bootkit_schema::{ReleaseRecord, SyncPage, SyncToken};
    use crate::catalog::Catalog;

    struct OnePage;

    #[async_trait]
    impl PackageServer for OnePage {
        async fn sync_page(&self, _: Option<&SyncToken>) -> Result<SyncPage, SyncError> {
            Ok(SyncPage {
                releases: vec![ReleaseRecord {
                    track: "STABLE".into(),
                    version: "1.0".into(),
                    tool: "tool@1.0.0".into(),
                    packages: Default::default(),
                    recommended: false,
                }],
                versions: vec![],
                builds: vec![],
                sync_token: SyncToken("done".into()),
                up_to_date: true,
            })
        }
    }

    #[tokio::test]
    async fn snapshot_is_pinned_and_closed() {
        let work = tempfile::TempDir::new().unwrap();
        let closed = take_snapshot(
            &OnePage,
            &ReleaseIdentity::new("STABLE", "1.0"),
            Some(work.path()),
        )
        .await
        .unwrap();

        assert!(closed.path().starts_with(work.path()));
        assert!(!wal_path(closed.path()).exists());

        let db = CatalogDb::open(closed.path()).unwrap();
        assert!(db.release_version("STABLE", "1.0").unwrap().unwrap().recommended);
    }

    #[tokio::test]
    async fn pinning_a_release_the_server_lacks_fails() {
        let result = take_snapshot(&OnePage, &ReleaseIdentity::new("STABLE", "2.0"), None).await;
        assert!(matches!(
            result,
            Err(BootstrapError::Catalog(CatalogError::UnknownRelease { .. }))
        ));
    }

    #[test]
    fn leftover_wal_is_fatal_every_time() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join(CATALOG_FILE);
        std::fs::write(&db, b"").unwrap();
        std::fs::write(wal_path(&db), b"uncommitted").unwrap();

        for _ in 0..2 {
            assert!(matches!(
                verify_no_wal(&db),
                Err(IntegrityError::WriteAheadLogRemains(p)) if p == db
            ));
        }
    }
}
