//! Subcommand implementations

pub mod bootstrap;
pub mod refresh;

use std::path::Path;

use anyhow::{Context, Result};
use bootkit_core::CatalogDb;

/// Open the official catalog, creating it and its directory if needed.
pub(crate) fn open_catalog(path: &Path) -> Result<CatalogDb> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    CatalogDb::open(path).with_context(|| format!("Failed to open catalog {}", path.display()))
}
