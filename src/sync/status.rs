use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use crate::conflict::{analyze, ConflictState};
use crate::manifest::Manifest;
use crate::settings::Settings;
use crate::storage::{Scope, StorageKey};

/// One tracked entry as seen against the manifest
#[derive(Debug, Clone, Serialize)]
pub struct StatusRow {
    pub path: String,
    pub name: String,
    /// Routed storage key, absent when the entry cannot be routed
    pub key: Option<String>,
    pub profile_specific: bool,
    pub state: ConflictState,
    pub repo_version: u64,
    pub local_version: u64,
    pub updated_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub local_modified: bool,
}

/// A manifest record no tracked entry maps to
#[derive(Debug, Clone, Serialize)]
pub struct UntrackedRecord {
    pub key: String,
    /// Profile the record belongs to, for profile-scoped keys
    pub profile: Option<String>,
    pub version: u64,
    pub updated_by: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusOverview {
    pub device_profile: Option<String>,
    pub rows: Vec<StatusRow>,
    pub untracked: Vec<UntrackedRecord>,
}

/// Compare every tracked entry with the manifest and list the remaining
/// records, which belong to other devices' profiles or to entries this
/// machine does not track.
pub fn status_overview(settings: &Settings, manifest: &Manifest, home: &Path) -> StatusOverview {
    let reports = analyze(&settings.entries, manifest, settings.profile(), home);

    let rows: Vec<StatusRow> = reports
        .iter()
        .zip(&settings.entries)
        .map(|(report, entry)| {
            let record = report
                .key
                .as_ref()
                .map(|k| manifest.get_record(k))
                .unwrap_or_default();
            StatusRow {
                path: entry.path.clone(),
                name: entry.label().to_string(),
                key: report.key.as_ref().map(StorageKey::to_string),
                profile_specific: entry.is_profile_specific,
                state: report.state,
                repo_version: record.version,
                local_version: entry.local_version,
                updated_by: record.updated_by,
                updated_at: record.updated_at,
                local_modified: matches!(
                    report.state,
                    ConflictState::ModifiedLocal | ConflictState::Conflict
                ),
            }
        })
        .collect();

    let tracked: HashSet<&str> = rows.iter().filter_map(|r| r.key.as_deref()).collect();
    let untracked = manifest
        .records()
        .filter(|(key, _)| !tracked.contains(key))
        .map(|(key, record)| UntrackedRecord {
            key: key.to_string(),
            profile: key.parse::<StorageKey>().ok().and_then(|k| match k.scope() {
                Scope::Profile(p) => Some(p.clone()),
                Scope::Shared => None,
            }),
            version: record.version,
            updated_by: record.updated_by.clone(),
            updated_at: record.updated_at,
        })
        .collect();

    StatusOverview {
        device_profile: settings.device_profile.clone(),
        rows,
        untracked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::TrackedEntry;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_overview_lists_untracked_records() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join(".zshrc"), "zsh").unwrap();

        let mut settings = Settings::default();
        settings.set_device_profile("home");
        settings.entries = vec![TrackedEntry::new("~/.zshrc", false)];

        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut manifest = Manifest::default();
        manifest.bump_version_by(&StorageKey::shared(".zshrc"), "h1", "laptop", now);
        manifest.bump_version_by(&StorageKey::profile("work", ".gitconfig"), "h2", "desk", now);
        manifest.bump_version_by(&StorageKey::shared(".tmux.conf"), "h3", "desk", now);

        let overview = status_overview(&settings, &manifest, home.path());

        assert_eq!(overview.rows.len(), 1);
        assert_eq!(overview.rows[0].key.as_deref(), Some("shared/.zshrc"));
        assert_eq!(overview.rows[0].repo_version, 1);
        assert_eq!(overview.rows[0].updated_by, "laptop");

        let keys: Vec<_> = overview.untracked.iter().map(|u| u.key.as_str()).collect();
        assert_eq!(keys, vec!["profiles/work/.gitconfig", "shared/.tmux.conf"]);
        assert_eq!(overview.untracked[0].profile.as_deref(), Some("work"));
        assert_eq!(overview.untracked[1].profile, None);
    }

    #[test]
    fn test_local_edit_is_flagged() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join(".vimrc"), "set nu").unwrap();

        let mut entry = TrackedEntry::new("~/.vimrc", false);
        entry.local_version = 1;
        entry.last_known_hash = "stale".to_string();
        let mut settings = Settings::default();
        settings.entries = vec![entry];

        let mut manifest = Manifest::default();
        manifest.bump_version(&StorageKey::shared(".vimrc"), "stale");

        let overview = status_overview(&settings, &manifest, home.path());
        assert!(overview.rows[0].local_modified);
        assert_eq!(overview.rows[0].state, ConflictState::ModifiedLocal);
    }
}
