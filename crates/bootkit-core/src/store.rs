//! Isolated on-disk package store.
//!
//! ```text
//! <root>/
//! ├── packages/<name>/<version>/       # extracted build payloads
//! ├── package-metadata/v1/packages.data.db
//! └── <launcher>                       # entry point link (or .bat shim)
//! ```
//!
//! A store only ever holds builds for the architectures it was asked to
//! download, so every store is specific to one target.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use bootkit_schema::{BuildManifest, BUILD_MANIFEST_FILE, OsArch, PackageRef, Platform};
use thiserror::Error;
use tracing::{debug, info};

use crate::Reporter;
use crate::catalog::{Catalog, CatalogError};
use crate::io::download::{BuildFetcher, DownloadError};
use crate::paths::{escape_package_name, store_metadata_path};

const PACKAGES_DIR: &str = "packages";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("no build of {package} for {arches}")]
    NoBuild { package: PackageRef, arches: String },

    #[error("Download of {package} failed: {source}")]
    Download {
        package: PackageRef,
        #[source]
        source: DownloadError,
    },

    #[error("invalid build manifest for {package}: {message}")]
    Manifest {
        package: PackageRef,
        message: String,
    },
}

/// Every package that could not be placed in a store, collected so that one
/// run reports all of them.
#[derive(Debug, Default)]
pub struct DownloadFailures {
    failures: Vec<StoreError>,
}

impl DownloadFailures {
    /// Whether every package succeeded.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed packages.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Individual failures in the order they happened.
    pub fn iter(&self) -> impl Iterator<Item = &StoreError> {
        self.failures.iter()
    }

    fn push(&mut self, err: StoreError) {
        self.failures.push(err);
    }
}

impl fmt::Display for DownloadFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DownloadFailures {}

/// Options for a new [`PackageStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Platform the store will run on, when it differs from the host.
    pub platform: Option<Platform>,
}

/// A package store rooted at a directory.
#[derive(Debug)]
pub struct PackageStore {
    root: PathBuf,
    platform: Platform,
}

impl PackageStore {
    /// Create (or reuse) a store at `root`.
    pub fn new(root: &Path, options: StoreOptions) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root.join(PACKAGES_DIR))?;
        let platform = options.platform.unwrap_or(if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        });
        Ok(Self {
            root: root.to_path_buf(),
            platform,
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Platform the store targets.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Directory of an installed package version, relative to the root.
    pub fn relative_package_path(&self, package: &str, version: &str) -> PathBuf {
        Path::new(PACKAGES_DIR)
            .join(escape_package_name(package))
            .join(version)
    }

    /// Absolute directory of an installed package version.
    pub fn package_path(&self, package: &str, version: &str) -> PathBuf {
        self.root.join(self.relative_package_path(package, version))
    }

    /// Where the catalog snapshot lives inside this store.
    pub fn metadata_path(&self) -> PathBuf {
        store_metadata_path(&self.root)
    }

    /// Whether a package version has been fully installed.
    pub fn is_installed(&self, package: &str, version: &str) -> bool {
        self.package_path(package, version).is_dir()
    }

    /// Download every package in `packages` that is not yet installed,
    /// choosing builds that support all of `arches`.
    ///
    /// Each package is unpacked into a staging directory and renamed into
    /// place only once complete. Failures are collected and returned
    /// together after every package has been attempted.
    pub async fn download_missing(
        &self,
        catalog: &dyn Catalog,
        fetcher: &dyn BuildFetcher,
        packages: &BTreeMap<String, String>,
        arches: &[OsArch],
        reporter: &dyn Reporter,
    ) -> Result<(), DownloadFailures> {
        let mut failures = DownloadFailures::default();

        for (package, version) in packages {
            if self.is_installed(package, version) {
                debug!(%package, %version, "already in store");
                continue;
            }
            let pkg = PackageRef::new(package, version);
            if let Some(arch) = arches.first() {
                reporter.fetching(&pkg, arch);
            }
            if let Err(err) = self.download_one(catalog, fetcher, &pkg, arches).await {
                failures.push(err);
            }
        }

        if failures.is_empty() {
            info!(root = %self.root.display(), count = packages.len(), "store populated");
            Ok(())
        } else {
            Err(failures)
        }
    }

    async fn download_one(
        &self,
        catalog: &dyn Catalog,
        fetcher: &dyn BuildFetcher,
        pkg: &PackageRef,
        arches: &[OsArch],
    ) -> Result<(), StoreError> {
        let build = catalog
            .builds_for_arches(&pkg.package, &pkg.version, arches)?
            .ok_or_else(|| StoreError::NoBuild {
                package: pkg.clone(),
                arches: join_arches(arches),
            })?;

        let final_dir = self.package_path(&pkg.package, &pkg.version);
        let parent = final_dir
            .parent()
            .ok_or_else(|| std::io::Error::other("package path has no parent"))?;
        std::fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-", pkg.version))
            .tempdir_in(parent)?;

        fetcher
            .fetch(&build, staging.path())
            .await
            .map_err(|source| StoreError::Download {
                package: pkg.clone(),
                source,
            })?;

        std::fs::rename(staging.path(), &final_dir)?;
        debug!(package = %pkg, build = %build.build_architectures, "installed");
        Ok(())
    }

    /// Read the build manifest of an installed package.
    pub fn load_manifest(&self, package: &str, version: &str) -> Result<BuildManifest, StoreError> {
        let path = self
            .package_path(package, version)
            .join(BUILD_MANIFEST_FILE);
        let manifest_error = |message: String| StoreError::Manifest {
            package: PackageRef::new(package, version),
            message,
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|e| manifest_error(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| manifest_error(e.to_string()))
    }

    /// Make the store directly invocable through `<root>/<launcher>`.
    ///
    /// `target` is relative to the root. Unix stores get a relative symlink;
    /// Windows stores get a `.bat` shim that forwards its arguments.
    pub fn link_entry_point(&self, launcher: &str, target: &Path) -> Result<PathBuf, StoreError> {
        match self.platform {
            Platform::Unix => {
                let link = self.root.join(launcher);
                if link.symlink_metadata().is_ok() {
                    std::fs::remove_file(&link)?;
                }
                crate::io::fs::symlink(target, &link)?;
                Ok(link)
            }
            Platform::Windows => {
                let shim = self.root.join(format!("{launcher}.bat"));
                let target = target.to_string_lossy().replace('/', "\\");
                std::fs::write(
                    &shim,
                    format!("@echo off\r\n\"%~dp0\\{target}.bat\" %*\r\n"),
                )?;
                Ok(shim)
            }
        }
    }
}

fn join_arches(arches: &[OsArch]) -> String {
    arches
        .iter()
        .map(OsArch::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use async_trait::async_trait;
    use bootkit_schema::{BuildRecord, ReleaseRecord};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct OneBuildEach;

    impl Catalog for OneBuildEach {
        fn release_version(&self, _: &str, _: &str) -> Result<Option<ReleaseRecord>, CatalogError> {
            Ok(None)
        }

        fn all_builds(
            &self,
            package: &str,
            version: &str,
        ) -> Result<Option<Vec<BuildRecord>>, CatalogError> {
            if package == "nobuild" {
                return Ok(Some(vec![]));
            }
            Ok(Some(vec![BuildRecord {
                package: package.into(),
                version: version.into(),
                build_architectures: "os".into(),
                url: format!("mem://{package}"),
                sha256: String::new(),
            }]))
        }
    }

    #[derive(Default)]
    struct RecordingFetcher {
        fetched: Mutex<Vec<String>>,
        fail: HashSet<String>,
    }

    #[async_trait]
    impl BuildFetcher for RecordingFetcher {
        async fn fetch(&self, build: &BuildRecord, dest: &Path) -> Result<(), DownloadError> {
            self.fetched.lock().unwrap().push(build.package.clone());
            if self.fail.contains(&build.package) {
                return Err(DownloadError::Io(std::io::Error::other("boom")));
            }
            std::fs::write(dest.join(BUILD_MANIFEST_FILE), r#"{"tools":[]}"#)?;
            Ok(())
        }
    }

    fn deps(list: &[(&str, &str)]) -> BTreeMap<String, String> {
        list.iter()
            .map(|(p, v)| ((*p).to_string(), (*v).to_string()))
            .collect()
    }

    fn linux() -> Vec<OsArch> {
        vec!["os.linux.x86_64".parse().unwrap()]
    }

    #[tokio::test]
    async fn downloads_only_missing_packages() {
        let dir = TempDir::new().unwrap();
        let store = PackageStore::new(dir.path(), StoreOptions::default()).unwrap();
        std::fs::create_dir_all(store.package_path("have", "1.0")).unwrap();

        let fetcher = RecordingFetcher::default();
        store
            .download_missing(
                &OneBuildEach,
                &fetcher,
                &deps(&[("have", "1.0"), ("acme:want", "2.0")]),
                &linux(),
                &NullReporter,
            )
            .await
            .unwrap();

        assert_eq!(*fetcher.fetched.lock().unwrap(), vec!["acme:want"]);
        assert!(dir.path().join("packages/acme_want/2.0/manifest.json").exists());
        assert!(store.load_manifest("acme:want", "2.0").unwrap().tools.is_empty());
    }

    #[tokio::test]
    async fn collects_every_failure() {
        let dir = TempDir::new().unwrap();
        let store = PackageStore::new(dir.path(), StoreOptions::default()).unwrap();

        let mut fetcher = RecordingFetcher::default();
        fetcher.fail.insert("broken".into());

        let failures = store
            .download_missing(
                &OneBuildEach,
                &fetcher,
                &deps(&[("broken", "1.0"), ("fine", "1.0"), ("nobuild", "1.0")]),
                &linux(),
                &NullReporter,
            )
            .await
            .unwrap_err();

        assert_eq!(failures.len(), 2);
        let text = failures.to_string();
        assert!(text.contains("broken@1.0"));
        assert!(text.contains("no build of nobuild@1.0 for os.linux.x86_64"));
        // The failed package leaves no half-installed directory behind.
        assert!(!store.is_installed("broken", "1.0"));
        assert!(store.is_installed("fine", "1.0"));
    }

    #[cfg(unix)]
    #[test]
    fn links_entry_point_relatively() {
        let dir = TempDir::new().unwrap();
        let store = PackageStore::new(dir.path(), StoreOptions::default()).unwrap();
        let rel = store.relative_package_path("tool", "1.0").join("bin/tool");
        std::fs::create_dir_all(dir.path().join(rel.parent().unwrap())).unwrap();
        std::fs::write(dir.path().join(&rel), "#!/bin/sh\n").unwrap();

        let link = store.link_entry_point("tool", &rel).unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), rel);
        assert!(link.exists());
    }

    #[test]
    fn windows_store_gets_batch_shim() {
        let dir = TempDir::new().unwrap();
        let store = PackageStore::new(
            dir.path(),
            StoreOptions {
                platform: Some(Platform::Windows),
            },
        )
        .unwrap();
        let shim = store
            .link_entry_point("tool", Path::new("packages/tool/1.0/bin/tool"))
            .unwrap();
        let body = std::fs::read_to_string(shim).unwrap();
        assert!(body.contains(r"packages\tool\1.0\bin\tool.bat"));
    }
}
