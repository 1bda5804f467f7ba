//! bootkit - offline bootstrap bundles for tool releases
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Builds one self-contained package store per target architecture for a
//! release of a package-based tool, so the tool can be installed on a
//! machine with no network access.
//!
//! # Layout
//!
//! ```text
//! ~/.bootkit/
//! └── packages.data.db      # official catalog, kept current by `refresh`
//!
//! <output>/tool-bootstrap-os.linux.x86_64.tar.gz
//! └── .bootkit/
//!     ├── packages/<name>/<version>/
//!     ├── package-metadata/v1/packages.data.db
//!     └── tool -> packages/tool/<version>/<tree>/tool
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bootkit_schema::{OsArch, ReleaseIdentity};
use clap::{Parser, Subcommand};

pub use bootkit_core::USER_AGENT;

/// Default package server.
pub const DEFAULT_SERVER_URL: &str = "https://packages.bootkit.dev";

#[derive(Debug, Parser)]
#[command(name = "bootkit")]
#[command(author, version, about = "bootkit - offline bootstrap bundles for tool releases")]
pub struct Cli {
    /// Official catalog database [default: $BOOTKIT_HOME/packages.data.db]
    #[arg(long, global = true, env = "BOOTKIT_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Package server to sync from
    #[arg(long, global = true, env = "BOOTKIT_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build bootstrap bundles for a release
    Bootstrap {
        /// Release as TRACK@VERSION, or VERSION on the default track
        release: ReleaseIdentity,
        /// Directory to write bundles to
        output_dir: PathBuf,
        /// Build only this architecture (e.g. os.linux.x86_64)
        #[arg(long)]
        target_arch: Option<OsArch>,
        /// Write directories instead of .tar.gz archives
        #[arg(long)]
        unpacked: bool,
        /// Name of the entry point placed at the store root
        #[arg(long, default_value = bootkit_core::bootstrap::DEFAULT_LAUNCHER)]
        launcher: String,
    },
    /// Sync the official catalog from the package server
    Refresh,
}

impl Cli {
    /// The official catalog path, from the flag or the bootkit home.
    pub fn catalog_path(&self) -> Result<PathBuf> {
        match &self.catalog {
            Some(path) => Ok(path.clone()),
            None => bootkit_core::catalog_path()
                .context("Could not determine home directory; pass --catalog"),
        }
    }
}

/// HTTP client shared by catalog sync and package downloads.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bootstrap_arguments() {
        let cli = Cli::try_parse_from([
            "bootkit",
            "bootstrap",
            "STABLE@1.0",
            "out",
            "--target-arch",
            "os.linux.x86_64",
            "--unpacked",
        ])
        .unwrap();

        let Commands::Bootstrap {
            release,
            output_dir,
            target_arch,
            unpacked,
            launcher,
        } = cli.command
        else {
            panic!("expected bootstrap");
        };
        assert_eq!(release, ReleaseIdentity::new("STABLE", "1.0"));
        assert_eq!(output_dir, PathBuf::from("out"));
        assert_eq!(target_arch.unwrap().as_str(), "os.linux.x86_64");
        assert!(unpacked);
        assert_eq!(launcher, "tool");
    }

    #[test]
    fn bare_version_uses_default_track() {
        let cli = Cli::try_parse_from(["bootkit", "bootstrap", "1.0", "out"]).unwrap();
        let Commands::Bootstrap { release, .. } = cli.command else {
            panic!("expected bootstrap");
        };
        assert_eq!(release.track, bootkit_schema::DEFAULT_TRACK);
    }

    #[test]
    fn rejects_non_os_target_arch() {
        assert!(
            Cli::try_parse_from([
                "bootkit",
                "bootstrap",
                "1.0",
                "out",
                "--target-arch",
                "web.browser",
            ])
            .is_err()
        );
    }

    #[test]
    fn explicit_catalog_wins() {
        let cli = Cli::try_parse_from(["bootkit", "--catalog", "/tmp/c.db", "refresh"]).unwrap();
        assert_eq!(cli.catalog_path().unwrap(), PathBuf::from("/tmp/c.db"));
    }
}
