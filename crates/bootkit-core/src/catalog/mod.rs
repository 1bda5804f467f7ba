//! Package catalog access.
//!
//! The catalog answers three questions: what a release contains, which
//! builds exist for a package version, and which of those builds runs on a
//! given set of architectures. Callers receive a `&dyn Catalog` explicitly;
//! there is no process-wide catalog.

pub mod db;
pub mod remote;

pub use db::CatalogDb;
pub use remote::{HttpPackageServer, PackageServer, SyncError, sync_from_remote};

use bootkit_schema::{BuildRecord, OsArch, ReleaseRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt catalog row: {0}")]
    Corrupt(String),

    #[error("release {track}@{version} is not in the catalog")]
    UnknownRelease { track: String, version: String },

    #[error("catalog lock poisoned")]
    Poisoned,
}

/// Read-only catalog queries.
pub trait Catalog: Send + Sync {
    /// Look up a release by track and version.
    fn release_version(
        &self,
        track: &str,
        version: &str,
    ) -> Result<Option<ReleaseRecord>, CatalogError>;

    /// Every build of a package version, in catalog order.
    ///
    /// `None` means the version itself is unknown; `Some(vec![])` means it is
    /// known but has no builds yet.
    fn all_builds(
        &self,
        package: &str,
        version: &str,
    ) -> Result<Option<Vec<BuildRecord>>, CatalogError>;

    /// The first build of a package version that supports every one of
    /// `arches`.
    fn builds_for_arches(
        &self,
        package: &str,
        version: &str,
        arches: &[OsArch],
    ) -> Result<Option<BuildRecord>, CatalogError> {
        let Some(builds) = self.all_builds(package, version)? else {
            return Ok(None);
        };
        Ok(builds.into_iter().find(|build| {
            build
                .architectures()
                .is_ok_and(|parsed| arches.iter().all(|arch| parsed.supports(arch)))
        }))
    }
}
