//! Domain errors that callers need to match on.
//!
//! Everything else flows through `anyhow::Result` with context attached at the
//! point of failure.

use std::path::PathBuf;
use thiserror::Error;

/// Conditions raised by the sync core that are not plain I/O failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A profile-specific entry was selected while no device profile is set.
    #[error(
        "a device profile must be set before syncing profile-specific entries: {}",
        .entries.join(", ")
    )]
    ProfileRequired { entries: Vec<String> },

    /// No remote repository URL has been configured yet.
    #[error("no sync repository configured. Run 'dotsync init --repo-url <URL>' first.")]
    NotConfigured,

    /// The entry cannot be mapped to a storage location.
    #[error("entry '{path}' is profile-specific but no device profile is set")]
    NotRoutable { path: String },

    /// No tracked entry matches the given path.
    #[error("no tracked entry matches '{0}'")]
    EntryNotFound(String),

    /// The entry is already tracked with the same profile setting.
    #[error("'{0}' is already tracked")]
    DuplicateEntry(String),

    /// The path is tracked both shared and profile-specific.
    #[error("'{0}' is tracked both ways; pass --shared or --profile-specific")]
    AmbiguousEntry(String),

    #[error("entry index {0} out of range")]
    IndexOutOfRange(usize),
}

/// A hard filesystem failure that aborted the legacy layout migration.
///
/// `migrated` counts the entries moved before the failure; they stay migrated.
#[derive(Debug, Error)]
#[error("legacy layout migration failed at {} after {migrated} entries", .path.display())]
pub struct MigrationError {
    pub migrated: usize,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
