//! Bundle emission: a directory copy or a `.tar.gz`, never half of either.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bootkit_schema::OsArch;
use thiserror::Error;
use tracing::warn;

use crate::io::archive::write_tar_gz;
use crate::io::fs::copy_tree;
use crate::paths::STORE_DIR;

#[derive(Error, Debug)]
#[error("writing {}: {source}", path.display())]
pub struct EmitError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// How a store is turned into a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleFormat {
    /// `<name>.tar.gz`
    #[default]
    TarGz,
    /// `<name>/` directory
    Unpacked,
}

/// Deterministic bundle base name, e.g. `tool-bootstrap-os.linux.x86_64`.
pub fn bundle_name(prefix: &str, arch: &OsArch) -> String {
    format!("{prefix}-{arch}")
}

/// Write the store at `store_root` into `output_dir` as `name`.
///
/// Output is staged under a hidden temporary name in `output_dir` and moved
/// into place only when complete; on failure the staged output is removed.
/// An existing bundle of the same name is replaced.
pub fn emit_bundle(
    store_root: &Path,
    output_dir: &Path,
    name: &str,
    format: BundleFormat,
) -> Result<PathBuf, EmitError> {
    match format {
        BundleFormat::TarGz => {
            let dest = output_dir.join(format!("{name}.tar.gz"));
            write_archive(store_root, output_dir, name, &dest).map_err(|source| EmitError {
                path: dest.clone(),
                source,
            })?;
            Ok(dest)
        }
        BundleFormat::Unpacked => {
            let dest = output_dir.join(name);
            write_directory(store_root, output_dir, name, &dest).map_err(|source| EmitError {
                path: dest.clone(),
                source,
            })?;
            Ok(dest)
        }
    }
}

fn write_archive(
    store_root: &Path,
    output_dir: &Path,
    name: &str,
    dest: &Path,
) -> std::io::Result<()> {
    let staged = tempfile::Builder::new()
        .prefix(&format!(".{name}"))
        .suffix(".partial")
        .tempfile_in(output_dir)?;

    let mut writer = write_tar_gz(store_root, Path::new(STORE_DIR), BufWriter::new(staged.as_file()))?;
    writer.flush()?;
    drop(writer);
    staged.as_file().sync_all()?;

    staged.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

fn write_directory(
    store_root: &Path,
    output_dir: &Path,
    name: &str,
    dest: &Path,
) -> std::io::Result<()> {
    let staged = tempfile::Builder::new()
        .prefix(&format!(".{name}"))
        .suffix(".partial")
        .tempdir_in(output_dir)?;
    copy_tree(store_root, &staged.path().join(STORE_DIR))?;

    // Move any previous bundle aside; it is only deleted once the new one
    // is in place.
    let previous = if dest.exists() {
        let aside = tempfile::Builder::new()
            .prefix(&format!(".{name}"))
            .suffix(".old")
            .tempdir_in(output_dir)?;
        let old = aside.path().join(name);
        std::fs::rename(dest, &old)?;
        Some((aside, old))
    } else {
        None
    };

    let staged = staged.keep();
    if let Err(err) = std::fs::rename(&staged, dest) {
        if let Some((_, old)) = &previous {
            if let Err(restore) = std::fs::rename(old, dest) {
                warn!(path = %dest.display(), error = %restore, "could not restore previous bundle");
            }
        }
        if let Err(cleanup) = std::fs::remove_dir_all(&staged) {
            warn!(path = %staged.display(), error = %cleanup, "could not remove staged bundle");
        }
        return Err(err);
    }

    if let Some((aside, _)) = previous {
        let aside_path = aside.path().to_path_buf();
        if let Err(cleanup) = aside.close() {
            warn!(path = %aside_path.display(), error = %cleanup, "could not remove previous bundle");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::archive::extract_tar_gz;
    use tempfile::TempDir;

    fn store() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("packages/tool/1.0")).unwrap();
        std::fs::write(dir.path().join("packages/tool/1.0/manifest.json"), "{}").unwrap();
        dir
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn names_bundle_after_arch() {
        let arch: OsArch = "os.linux.x86_64".parse().unwrap();
        assert_eq!(
            bundle_name("tool-bootstrap", &arch),
            "tool-bootstrap-os.linux.x86_64"
        );
    }

    #[test]
    fn archive_extracts_under_store_dir() {
        let src = store();
        let out = TempDir::new().unwrap();
        let path = emit_bundle(src.path(), out.path(), "b-os.linux", BundleFormat::TarGz).unwrap();

        assert_eq!(listing(out.path()), vec!["b-os.linux.tar.gz"]);
        let unpacked = TempDir::new().unwrap();
        extract_tar_gz(&path, unpacked.path()).unwrap();
        assert!(
            unpacked
                .path()
                .join(".bootkit/packages/tool/1.0/manifest.json")
                .exists()
        );
    }

    #[test]
    fn unpacked_bundle_is_a_directory() {
        let src = store();
        let out = TempDir::new().unwrap();
        let path =
            emit_bundle(src.path(), out.path(), "b-os.linux", BundleFormat::Unpacked).unwrap();

        assert_eq!(listing(out.path()), vec!["b-os.linux"]);
        assert!(path.join(".bootkit/packages/tool/1.0/manifest.json").exists());

        // Re-emitting replaces rather than merging, and leaves no old copy.
        std::fs::write(path.join("stale"), "x").unwrap();
        emit_bundle(src.path(), out.path(), "b-os.linux", BundleFormat::Unpacked).unwrap();
        assert!(!path.join("stale").exists());
        assert!(path.join(".bootkit/packages/tool/1.0/manifest.json").exists());
        assert_eq!(listing(out.path()), vec!["b-os.linux"]);
    }

    #[test]
    fn failed_replacement_keeps_previous_bundle() {
        let src = store();
        let out = TempDir::new().unwrap();
        let path =
            emit_bundle(src.path(), out.path(), "b-os.linux", BundleFormat::Unpacked).unwrap();
        std::fs::write(path.join("marker"), "previous").unwrap();

        let missing = out.path().join("no-such-store");
        assert!(emit_bundle(&missing, out.path(), "b-os.linux", BundleFormat::Unpacked).is_err());

        assert_eq!(listing(out.path()), vec!["b-os.linux"]);
        assert_eq!(std::fs::read_to_string(path.join("marker")).unwrap(), "previous");
        assert!(path.join(".bootkit/packages/tool/1.0/manifest.json").exists());
    }

    #[test]
    fn failed_archive_leaves_nothing_behind() {
        let out = TempDir::new().unwrap();
        let missing = out.path().join("no-such-store");
        let err = emit_bundle(&missing, out.path(), "b-os.linux", BundleFormat::TarGz).unwrap_err();

        assert_eq!(err.path, out.path().join("b-os.linux.tar.gz"));
        assert!(listing(out.path()).is_empty());
    }

    #[test]
    fn failed_copy_leaves_nothing_behind() {
        let out = TempDir::new().unwrap();
        let missing = out.path().join("no-such-store");
        assert!(emit_bundle(&missing, out.path(), "b-os.linux", BundleFormat::Unpacked).is_err());
        assert!(listing(out.path()).is_empty());
    }
}
