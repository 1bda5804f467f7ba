use dirs::home_dir;
use std::path::{Path, PathBuf};

/// File name of a catalog database, both locally and inside bundles.
pub const CATALOG_FILE: &str = "packages.data.db";

/// Directory every package store lives in; bundles extract to it.
pub const STORE_DIR: &str = ".bootkit";

/// Returns the primary configuration directory, or None if the user's home cannot be resolved.
pub fn try_bootkit_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("BOOTKIT_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(STORE_DIR))
}

/// Official catalog path: ~/.bootkit/packages.data.db
pub fn catalog_path() -> Option<PathBuf> {
    try_bootkit_home().map(|h| h.join(CATALOG_FILE))
}

/// Catalog location inside a package store rooted at `root`.
pub fn store_metadata_path(root: &Path) -> PathBuf {
    root.join("package-metadata").join("v1").join(CATALOG_FILE)
}

/// Path of the write-ahead log SQLite keeps beside `db`.
pub fn wal_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_owned();
    name.push("-wal");
    PathBuf::from(name)
}

/// Escape a package name for use as a directory name.
///
/// `:` separates namespaces in package names and is not portable.
pub fn escape_package_name(name: &str) -> String {
    name.replace(':', "_")
}
