//! Refresh command

use std::path::Path;

use anyhow::Result;
use bootkit_core::Reporter;
use bootkit_core::catalog::remote::connection_guidance;
use bootkit_core::catalog::{HttpPackageServer, sync_from_remote};

use crate::ui::ConsoleReporter;

/// Bring the official catalog up to date with the package server.
pub async fn refresh(catalog_path: &Path, server_url: &str, quiet: bool) -> Result<()> {
    let reporter = ConsoleReporter::new(quiet);
    let catalog = super::open_catalog(catalog_path)?;
    let since = catalog.sync_token()?;

    reporter.section(&format!("Syncing catalog from {server_url}"));
    let server = HttpPackageServer::new(crate::http_client()?, server_url);
    match sync_from_remote(&catalog, &server, since).await {
        Ok(pages) => {
            reporter.success(&format!("Catalog up to date ({pages} page(s) applied)"));
            Ok(())
        }
        Err(err) => {
            if err.is_connection() {
                reporter.error(&connection_guidance(&err));
            }
            Err(err.into())
        }
    }
}
