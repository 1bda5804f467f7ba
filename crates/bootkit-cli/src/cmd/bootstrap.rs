//! Bootstrap command

use std::path::{Path, PathBuf};

use anyhow::Result;
use bootkit_core::bootstrap::{BootstrapOptions, Bootstrapper, BundleFormat};
use bootkit_core::{HttpFetcher, HttpPackageServer, Reporter};
use bootkit_schema::{OsArch, ReleaseIdentity};

use crate::ui::ConsoleReporter;

/// Arguments of `bootkit bootstrap`.
#[derive(Debug)]
pub struct BootstrapArgs {
    pub release: ReleaseIdentity,
    pub output_dir: PathBuf,
    pub target_arch: Option<OsArch>,
    pub unpacked: bool,
    pub launcher: String,
}

/// Build bootstrap bundles for a release from the official catalog.
pub async fn bootstrap(
    catalog_path: &Path,
    server_url: &str,
    quiet: bool,
    args: BootstrapArgs,
) -> Result<()> {
    let reporter = ConsoleReporter::new(quiet);
    let catalog = super::open_catalog(catalog_path)?;
    if catalog.sync_token()?.is_none() {
        reporter.warning("The local catalog has never been synced; run `bootkit refresh` first.");
    }

    let client = crate::http_client()?;
    let server = HttpPackageServer::new(client.clone(), server_url);
    let fetcher = HttpFetcher::new(client);

    let mut opts = BootstrapOptions::new(args.release, args.output_dir);
    opts.target_arch = args.target_arch;
    opts.launcher = args.launcher;
    if args.unpacked {
        opts.format = BundleFormat::Unpacked;
    }

    let summary = Bootstrapper::new(&catalog, &server, &fetcher, &reporter)
        .run(&opts)
        .await?;

    tracing::debug!(
        release = %summary.release,
        tool = %summary.tool,
        bundles = summary.bundles.len(),
        "bootstrap finished"
    );
    Ok(())
}
