//! Terminal output

use std::io::Write;
use std::path::Path;

use bootkit_core::Reporter;
use bootkit_schema::{OsArch, PackageRef};
use crossterm::style::Stylize;

/// [`Reporter`] printing styled lines to the terminal.
///
/// Progress goes to stdout and is dropped in quiet mode; warnings and errors
/// always go to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn out(&self, line: impl std::fmt::Display) {
        if self.quiet {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
    }

    fn err(line: impl std::fmt::Display) {
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.out("");
        self.out(title.bold());
    }

    fn fetching(&self, package: &PackageRef, arch: &OsArch) {
        self.out(format!(
            "  {} {} {}",
            "↓".dark_grey(),
            package,
            format!("({arch})").dark_grey()
        ));
    }

    fn emitted(&self, arch: &OsArch, path: &Path) {
        self.out(format!(
            "  {} {} {}",
            "✓".green(),
            arch,
            path.display().to_string().dark_grey()
        ));
    }

    fn info(&self, msg: &str) {
        self.out(format!("{} {msg}", "ℹ".blue()));
    }

    fn success(&self, msg: &str) {
        self.out(format!("{} {}", "✓".green().bold(), msg.green()));
    }

    fn warning(&self, msg: &str) {
        Self::err(format!("{} {}", "⚠".yellow(), msg.yellow()));
    }

    fn error(&self, msg: &str) {
        Self::err(format!("{} {}", "✗".red().bold(), msg.red()));
    }

    fn job_errors(&self, header: &str, errors: &[String]) {
        Self::err(header.red().bold());
        for error in errors {
            for line in error.lines() {
                Self::err(format!("  {line}"));
            }
        }
    }
}
