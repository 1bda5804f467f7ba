//! Build architecture identifiers.
//!
//! A package build declares the architectures it runs on as a composite
//! identifier of `+`-joined components, e.g. `os.linux.x86_64+web.browser`.
//! Exactly one component names the operating system/CPU pair and starts with
//! `os.`; that component is the build's [`OsArch`].
//!
//! # Example
//!
//! ```
//! use bootkit_schema::BuildArchitectures;
//!
//! let archs: BuildArchitectures = "os.osx.arm64+web.browser".parse().unwrap();
//! assert_eq!(archs.os_arch().unwrap().as_str(), "os.osx.arm64");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix shared by every OS architecture component.
pub const OS_PREFIX: &str = "os.";

/// Errors raised while interpreting architecture identifiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchError {
    /// The composite identifier has no `os.*` component or more than one.
    #[error("build architecture {identifier} lacks unique os.* (found {found})")]
    NoUniqueOsArch {
        /// The offending composite identifier.
        identifier: String,
        /// How many `os.*` components were found.
        found: usize,
    },

    /// A standalone architecture tag does not start with `os.`.
    #[error("not an os architecture: {0}")]
    NotOsArch(String),

    /// The composite identifier has no non-empty component at all.
    #[error("empty build architecture {0:?}")]
    EmptyComponent(String),
}

/// Runtime platform family an architecture belongs to.
///
/// Windows targets get platform-specific launchers and downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    /// Anything POSIX-like (Linux, macOS, BSDs).
    #[default]
    Unix,
    /// Microsoft Windows.
    Windows,
}

impl Platform {
    /// Short lowercase name (`unix` / `win32`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Windows => "win32",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `os.*` architecture tag such as `os.linux.x86_64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OsArch(String);

impl OsArch {
    /// The tag as written in the catalog.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Platform family; any tag mentioning `win` is treated as Windows.
    pub fn platform(&self) -> Platform {
        if self.0.to_ascii_lowercase().contains("win") {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

impl fmt::Display for OsArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OsArch {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > OS_PREFIX.len() && s.starts_with(OS_PREFIX) {
            Ok(Self(s.to_string()))
        } else {
            Err(ArchError::NotOsArch(s.to_string()))
        }
    }
}

impl TryFrom<String> for OsArch {
    type Error = ArchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OsArch> for String {
    fn from(arch: OsArch) -> Self {
        arch.0
    }
}

/// Parsed composite architecture identifier of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArchitectures {
    raw: String,
    components: Vec<String>,
}

impl BuildArchitectures {
    /// Split a `+`-joined identifier into its components.
    ///
    /// Empty components (`os.linux++web`, a trailing `+`) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::EmptyComponent`] when nothing but separators
    /// remains.
    pub fn parse(raw: &str) -> Result<Self, ArchError> {
        let components: Vec<String> = raw
            .split('+')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if components.is_empty() {
            return Err(ArchError::EmptyComponent(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    /// The identifier exactly as it was parsed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Individual components in declaration order.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The unique `os.*` component.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::NoUniqueOsArch`] when zero or several components
    /// carry the `os.` prefix.
    pub fn os_arch(&self) -> Result<OsArch, ArchError> {
        let os: Vec<&String> = self
            .components
            .iter()
            .filter(|c| c.starts_with(OS_PREFIX))
            .collect();
        match os.as_slice() {
            [tag] => Ok(OsArch((*tag).clone())),
            _ => Err(ArchError::NoUniqueOsArch {
                identifier: self.raw.clone(),
                found: os.len(),
            }),
        }
    }

    /// Whether a build with these components can run on `arch`.
    ///
    /// A component supports an architecture when it is equal to it or is a
    /// dotted prefix of it, so a generic `os` build supports `os.linux.x86_64`.
    pub fn supports(&self, arch: &OsArch) -> bool {
        let target = arch.as_str();
        self.components.iter().any(|c| {
            target == c
                || target
                    .strip_prefix(c.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

impl fmt::Display for BuildArchitectures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for BuildArchitectures {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
