//! Shared types and wire format for bootkit.

pub mod arch;
pub mod sync;
pub mod types;

// Re-exports
pub use arch::*;
pub use sync::{SyncPage, SyncRequest, SyncToken, VersionRecord};
pub use types::*;
