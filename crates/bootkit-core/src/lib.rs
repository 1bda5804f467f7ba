//! Core library for bootkit.
//!
//! Builds offline-installable bootstrap bundles for a release of a
//! package-based tool: one self-contained package store per target
//! architecture, holding exactly the release's packages, a pinned catalog
//! snapshot, and a link to the tool's entry point.

pub mod bootstrap;
pub mod catalog;
pub mod io;
pub mod paths;
pub mod reporter;
pub mod store;

pub use bootstrap::{BootstrapError, BootstrapOptions, BootstrapSummary, Bootstrapper};
pub use catalog::{Catalog, CatalogDb, CatalogError, HttpPackageServer, PackageServer};
pub use io::download::{BuildFetcher, HttpFetcher};
pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("bootkit/", env!("CARGO_PKG_VERSION"));
