//! SQLite catalog database
//!
//! Holds releases, package versions and builds pulled from the package
//! server, plus the sync cursor. The same type backs the user's official
//! catalog and the throwaway snapshots shipped inside bundles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use bootkit_schema::{BuildRecord, ReleaseRecord, SyncPage, SyncToken};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{Catalog, CatalogError};

const SYNC_TOKEN_KEY: &str = "sync_token";

/// A catalog stored in a single SQLite file.
///
/// The connection runs in WAL mode while open. [`close_permanently`]
/// folds the log back into the main file so that the file alone is a
/// complete copy.
///
/// [`close_permanently`]: CatalogDb::close_permanently
#[derive(Debug)]
pub struct CatalogDb {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl CatalogDb {
    /// Open or create the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), CatalogError> {
        self.lock()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS releases (
                track TEXT NOT NULL,
                version TEXT NOT NULL,
                tool TEXT NOT NULL,
                packages TEXT NOT NULL,
                recommended INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (track, version)
            );

            CREATE TABLE IF NOT EXISTS versions (
                package TEXT NOT NULL,
                version TEXT NOT NULL,
                PRIMARY KEY (package, version)
            );

            CREATE TABLE IF NOT EXISTS builds (
                package TEXT NOT NULL,
                version TEXT NOT NULL,
                build_architectures TEXT NOT NULL,
                url TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                PRIMARY KEY (package, version, build_architectures)
            );

            CREATE TABLE IF NOT EXISTS sync_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Apply one page of server changes atomically.
    pub fn apply_page(&self, page: &SyncPage) -> Result<(), CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for release in &page.releases {
            let packages = serde_json::to_string(&release.packages)
                .map_err(|e| CatalogError::Corrupt(e.to_string()))?;
            tx.execute(
                "INSERT OR REPLACE INTO releases (track, version, tool, packages, recommended)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    release.track,
                    release.version,
                    release.tool,
                    packages,
                    release.recommended
                ],
            )?;
        }

        for v in &page.versions {
            tx.execute(
                "INSERT OR IGNORE INTO versions (package, version) VALUES (?1, ?2)",
                params![v.package, v.version],
            )?;
        }

        for build in &page.builds {
            tx.execute(
                "INSERT OR IGNORE INTO versions (package, version) VALUES (?1, ?2)",
                params![build.package, build.version],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO builds (package, version, build_architectures, url, sha256)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    build.package,
                    build.version,
                    build.build_architectures,
                    build.url,
                    build.sha256
                ],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?1, ?2)",
            params![SYNC_TOKEN_KEY, page.sync_token.as_str()],
        )?;
        tx.commit()?;

        debug!(
            releases = page.releases.len(),
            builds = page.builds.len(),
            "applied sync page"
        );
        Ok(())
    }

    /// Cursor of the last applied page, if any.
    pub fn sync_token(&self) -> Result<Option<SyncToken>, CatalogError> {
        let conn = self.lock()?;
        let token = conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?1",
                params![SYNC_TOKEN_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(token.map(SyncToken))
    }

    /// Mark a release as recommended regardless of what the server said.
    pub fn force_recommend_release(&self, track: &str, version: &str) -> Result<(), CatalogError> {
        let updated = self.lock()?.execute(
            "UPDATE releases SET recommended = 1 WHERE track = ?1 AND version = ?2",
            params![track, version],
        )?;
        if updated == 0 {
            return Err(CatalogError::UnknownRelease {
                track: track.to_string(),
                version: version.to_string(),
            });
        }
        Ok(())
    }

    /// Flush the write-ahead log into the main file and close for good.
    ///
    /// Switching the journal back to `DELETE` makes SQLite remove the
    /// `-wal` sidecar once the last connection closes.
    pub fn close_permanently(self) -> Result<(), CatalogError> {
        let conn = self.conn.into_inner().map_err(|_| CatalogError::Poisoned)?;
        conn.execute_batch(
            "PRAGMA wal_checkpoint(TRUNCATE);
             PRAGMA journal_mode=DELETE;",
        )?;
        conn.close().map_err(|(_, e)| CatalogError::Sqlite(e))?;
        debug!(path = %self.path.display(), "catalog closed");
        Ok(())
    }
}

impl Catalog for CatalogDb {
    fn release_version(
        &self,
        track: &str,
        version: &str,
    ) -> Result<Option<ReleaseRecord>, CatalogError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT track, version, tool, packages, recommended
                 FROM releases WHERE track = ?1 AND version = ?2",
                params![track, version],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((track, version, tool, packages, recommended)) = row else {
            return Ok(None);
        };
        let packages: BTreeMap<String, String> = serde_json::from_str(&packages)
            .map_err(|e| CatalogError::Corrupt(format!("packages of {track}@{version}: {e}")))?;

        Ok(Some(ReleaseRecord {
            track,
            version,
            tool,
            packages,
            recommended,
        }))
    }

    fn all_builds(
        &self,
        package: &str,
        version: &str,
    ) -> Result<Option<Vec<BuildRecord>>, CatalogError> {
        let conn = self.lock()?;
        let known: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM versions WHERE package = ?1 AND version = ?2)",
            params![package, version],
            |row| row.get(0),
        )?;
        if !known {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT package, version, build_architectures, url, sha256
             FROM builds WHERE package = ?1 AND version = ?2 ORDER BY rowid",
        )?;
        let builds = stmt
            .query_map(params![package, version], |row| {
                Ok(BuildRecord {
                    package: row.get(0)?,
                    version: row.get(1)?,
                    build_architectures: row.get(2)?,
                    url: row.get(3)?,
                    sha256: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(builds))
    }
}
