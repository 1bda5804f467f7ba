//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific terminal implementation.

use bootkit_schema::{OsArch, PackageRef};

/// Sink for user-facing progress and diagnostics.
pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Syncing catalog").
    fn section(&self, title: &str);

    /// A package build is being fetched into a store.
    fn fetching(&self, package: &PackageRef, arch: &OsArch);

    /// A bundle was written.
    fn emitted(&self, arch: &OsArch, path: &std::path::Path);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// Print a batch of job errors under one header
    /// (e.g. "=> Errors finding builds:").
    fn job_errors(&self, header: &str, errors: &[String]);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn fetching(&self, package: &PackageRef, arch: &OsArch) {
        (**self).fetching(package, arch);
    }
    fn emitted(&self, arch: &OsArch, path: &std::path::Path) {
        (**self).emitted(arch, path);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
    fn job_errors(&self, header: &str, errors: &[String]) {
        (**self).job_errors(header, errors);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn fetching(&self, _: &PackageRef, _: &OsArch) {}
    fn emitted(&self, _: &OsArch, _: &std::path::Path) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn job_errors(&self, _: &str, _: &[String]) {}
}
