//! Version manifest stored at the root of the sync repository.
//!
//! The manifest is committed and pushed with the tracked content, so every
//! device sees the same versions and hashes after its next sync. There is no
//! locking: two devices that back up the same key without syncing in between
//! race, and the last push wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::StorageKey;

/// File name of the manifest inside the repository
pub const MANIFEST_FILE: &str = ".dotsync-manifest.yaml";

/// Shared state of one storage key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Monotonic counter, 0 means never backed up
    #[serde(default)]
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Hostname of the machine that made the last bump
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_hash: String,
}

impl ManifestRecord {
    /// True if any device has ever backed this key up
    pub fn exists(&self) -> bool {
        self.version > 0
    }
}

/// Mapping from storage key to its record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Keyed by the slash-joined storage key; legacy files may also hold raw
    /// entry paths until migration rewrites them.
    #[serde(default)]
    entries: BTreeMap<String, ManifestRecord>,
}

impl Manifest {
    pub fn manifest_path(repo_path: &Path) -> PathBuf {
        repo_path.join(MANIFEST_FILE)
    }

    /// Load the manifest from a repository clone.
    ///
    /// A missing file means nothing was ever synced and yields an empty manifest.
    pub fn load(repo_path: &Path) -> Result<Self> {
        let path = Self::manifest_path(repo_path);
        if !path.exists() {
            log::debug!("No manifest at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    /// Write the manifest into the repository clone
    pub fn save(&self, repo_path: &Path) -> Result<()> {
        let path = Self::manifest_path(repo_path);
        fs::create_dir_all(repo_path)
            .with_context(|| format!("Failed to create {}", repo_path.display()))?;

        let content = serde_yaml::to_string(self).context("Failed to serialize manifest")?;
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write manifest: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace manifest: {}", path.display()))?;

        Ok(())
    }

    /// Record a backup of `key` with `content_hash`, stamped by this machine.
    ///
    /// Returns `false` without touching the record when it already holds the
    /// same hash, so re-backing up unchanged content never bumps the version.
    pub fn bump_version(&mut self, key: &StorageKey, content_hash: &str) -> bool {
        self.bump_version_by(key, content_hash, &machine_id(), Utc::now())
    }

    pub fn bump_version_by(
        &mut self,
        key: &StorageKey,
        content_hash: &str,
        updated_by: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let record = self.entries.entry(key.to_string()).or_default();
        if record.exists() && record.content_hash == content_hash {
            return false;
        }

        record.version += 1;
        record.content_hash = content_hash.to_string();
        record.updated_at = Some(now);
        record.updated_by = updated_by.to_string();
        log::debug!("{} bumped to v{}", key, record.version);
        true
    }

    /// Version of `key`, 0 if never backed up
    pub fn get_version(&self, key: &StorageKey) -> u64 {
        self.entries
            .get(&key.to_string())
            .map(|r| r.version)
            .unwrap_or(0)
    }

    /// Record of `key`, or the zero record if absent
    pub fn get_record(&self, key: &StorageKey) -> ManifestRecord {
        self.entries
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        self.entries.contains_key(&key.to_string())
    }

    /// All records with their raw keys, in key order
    pub fn records(&self) -> impl Iterator<Item = (&str, &ManifestRecord)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move a record stored under a pre-layout raw key to its routed key.
    ///
    /// An existing record under the routed key is left alone.
    pub fn rename_legacy_key(&mut self, legacy_key: &str, key: &StorageKey) -> bool {
        let new_key = key.to_string();
        if self.entries.contains_key(&new_key) {
            return false;
        }
        match self.entries.remove(legacy_key) {
            Some(record) => {
                self.entries.insert(new_key, record);
                true
            }
            None => false,
        }
    }
}

/// Identifier of this machine used for `updated_by`
pub fn machine_id() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
