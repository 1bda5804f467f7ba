//! Gzip tarball creation and extraction.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Write `src_dir` as a gzip tarball to `writer`, with every entry placed
/// under `prefix`.
///
/// Symlinks are stored as links rather than followed; a store's entry-point
/// link must stay a link when the bundle is unpacked.
pub fn write_tar_gz<W: Write>(src_dir: &Path, prefix: &Path, writer: W) -> std::io::Result<W> {
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut tar_builder = tar::Builder::new(encoder);
    tar_builder.follow_symlinks(false);

    tar_builder.append_dir_all(prefix, src_dir)?;
    tar_builder.finish()?;
    tar_builder.into_inner()?.finish()
}

/// Create `dest_archive` from `src_dir` (entries under `prefix`).
pub fn create_tar_gz(src_dir: &Path, prefix: &Path, dest_archive: &Path) -> std::io::Result<()> {
    let file = File::create(dest_archive)?;
    let mut writer = write_tar_gz(src_dir, prefix, BufWriter::new(file))?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Unpack a gzip tarball into `dest_dir`.
pub fn extract_tar_gz(archive: &Path, dest_dir: &Path) -> std::io::Result<()> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);
    tar.unpack(dest_dir)
}
