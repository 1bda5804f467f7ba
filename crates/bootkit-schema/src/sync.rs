//! Catalog sync wire format.
//!
//! A client posts its last [`SyncToken`] (or none for a full sync) and the
//! server replies with one [`SyncPage`] of changes. The client repeats until
//! a page reports `up_to_date`.

use serde::{Deserialize, Serialize};

use crate::types::{BuildRecord, ReleaseRecord};

/// Opaque server cursor marking how far a client has synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(pub String);

impl SyncToken {
    /// Token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Body of a sync request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Cursor from the previous page, absent on a fresh sync.
    pub sync_token: Option<SyncToken>,
}

/// One batch of catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPage {
    /// Releases added or changed since the request token.
    #[serde(default)]
    pub releases: Vec<ReleaseRecord>,
    /// Package versions published since the request token.
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
    /// Builds added or changed since the request token.
    #[serde(default)]
    pub builds: Vec<BuildRecord>,
    /// Cursor to send with the next request.
    pub sync_token: SyncToken,
    /// No further pages are pending.
    #[serde(default)]
    pub up_to_date: bool,
}

/// A published package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Package name.
    pub package: String,
    /// Version string.
    pub version: String,
}
