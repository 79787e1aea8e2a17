use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::entry::TrackedEntry;
use crate::hash::hash_entry;
use crate::manifest::{Manifest, ManifestRecord};
use crate::storage::StorageKey;

/// Local-vs-repository sync state of one entry.
///
/// Computed fresh on every analysis pass and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictState {
    /// Nothing to protect: local matches its baseline and the repo has nothing newer
    Clean,
    /// Another device backed up different content; local is unchanged
    NewerInRepo,
    /// Local content changed since the last backup or restore
    ModifiedLocal,
    /// Both local content and the repository moved on
    Conflict,
    /// The entry cannot be routed (profile-specific without a device profile)
    Unknown,
}

impl ConflictState {
    pub fn label(&self) -> &'static str {
        match self {
            ConflictState::Clean => "clean",
            ConflictState::NewerInRepo => "newer in repo",
            ConflictState::ModifiedLocal => "modified locally",
            ConflictState::Conflict => "conflict",
            ConflictState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConflictState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Analysis result for a single entry
#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    /// Position of the entry in the analyzed slice
    pub index: usize,
    pub path: String,
    #[serde(serialize_with = "serialize_key")]
    pub key: Option<StorageKey>,
    pub state: ConflictState,
    /// Current on-disk hash, `None` when the local path is missing or unreadable
    pub local_hash: Option<String>,
    pub repo_hash: String,
    pub repo_version: u64,
    pub local_version: u64,
}

fn serialize_key<S: serde::Serializer>(key: &Option<StorageKey>, s: S) -> Result<S::Ok, S::Error> {
    match key {
        Some(k) => s.serialize_some(&k.to_string()),
        None => s.serialize_none(),
    }
}

/// Classify one entry from its current local hash and its manifest record.
///
/// An empty remembered hash means this machine never synced the entry: it is
/// only flagged when real content differs from a recorded remote hash.
/// A newer repository version whose hash equals the local content is not
/// reported, so a re-backup of unchanged files never raises a warning.
pub fn classify(
    entry: &TrackedEntry,
    local_hash: Option<&str>,
    record: &ManifestRecord,
) -> ConflictState {
    let Some(local_hash) = local_hash else {
        return ConflictState::Clean;
    };

    let repo_hash = record.content_hash.as_str();
    let repo_newer = record.version > entry.local_version;

    if entry.last_known_hash.is_empty() {
        if !repo_hash.is_empty() && repo_hash != local_hash {
            return if repo_newer {
                ConflictState::Conflict
            } else {
                ConflictState::ModifiedLocal
            };
        }
        return ConflictState::Clean;
    }

    let local_modified = local_hash != entry.last_known_hash;

    match (local_modified, repo_newer) {
        (false, false) => ConflictState::Clean,
        (false, true) => {
            if !repo_hash.is_empty() && repo_hash != local_hash {
                ConflictState::NewerInRepo
            } else {
                ConflictState::Clean
            }
        }
        (true, false) => ConflictState::ModifiedLocal,
        (true, true) => ConflictState::Conflict,
    }
}

/// Compute the sync state of every entry, in order.
///
/// Read-only: hashes local content but never writes files, versions or hashes.
pub fn analyze(
    entries: &[TrackedEntry],
    manifest: &Manifest,
    profile: Option<&str>,
    home: &Path,
) -> Vec<ConflictReport> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let key = StorageKey::for_entry(entry, profile, home).ok();
            let record = key
                .as_ref()
                .map(|k| manifest.get_record(k))
                .unwrap_or_default();

            let (state, local_hash) = match &key {
                None => (ConflictState::Unknown, None),
                Some(_) => {
                    let local_hash = match hash_entry(entry, home) {
                        Ok(h) => Some(h),
                        Err(err) => {
                            log::debug!("{} not hashable locally: {:#}", entry.path, err);
                            None
                        }
                    };
                    (classify(entry, local_hash.as_deref(), &record), local_hash)
                }
            };

            ConflictReport {
                index,
                path: entry.path.clone(),
                key,
                state,
                local_hash,
                repo_hash: record.content_hash,
                repo_version: record.version,
                local_version: entry.local_version,
            }
        })
        .collect()
}

/// Entries a backup would clobber: the repository holds content this machine
/// has not seen.
pub fn blocking_for_backup(reports: &[ConflictReport]) -> Vec<&ConflictReport> {
    reports
        .iter()
        .filter(|r| matches!(r.state, ConflictState::Conflict | ConflictState::NewerInRepo))
        .collect()
}

/// Entries a restore would clobber: local edits not yet backed up.
pub fn blocking_for_restore(reports: &[ConflictReport]) -> Vec<&ConflictReport> {
    reports
        .iter()
        .filter(|r| matches!(r.state, ConflictState::Conflict | ConflictState::ModifiedLocal))
        .collect()
}
