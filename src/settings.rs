use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::TrackedEntry;
use crate::error::SyncError;

/// Local configuration for this machine.
///
/// Lives outside the synced repository and is never shared. Only the manifest
/// records derived from each entry travel to other devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Remote git URL of the sync repository
    #[serde(default)]
    pub repo_url: String,

    /// Where the local clone lives
    #[serde(default, alias = "repo_local_path")]
    pub repo_path: PathBuf,

    /// Free-text machine identity (e.g. "work", "home")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<TrackedEntry>,
}

impl Settings {
    /// Load settings from the default location
    pub fn load() -> Result<Self> {
        let path = crate::config::ConfigManager::settings_file_path()?;
        let default_repo = crate::config::ConfigManager::default_repo_dir()?;
        Self::load_from(&path, &default_repo)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&crate::config::ConfigManager::settings_file_path()?)
    }

    /// Load settings from `path`.
    ///
    /// A missing file is a fresh install, not an error: defaults are returned
    /// with the repository path set to `default_repo`.
    pub fn load_from(path: &Path, default_repo: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str::<Settings>(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Settings::default()
        };

        if settings.repo_path.as_os_str().is_empty() {
            settings.repo_path = default_repo.to_path_buf();
        }

        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
        }

        Ok(())
    }

    /// True once a remote repository URL has been set
    pub fn is_configured(&self) -> bool {
        !self.repo_url.trim().is_empty()
    }

    /// Device profile, if one is set
    pub fn profile(&self) -> Option<&str> {
        self.device_profile.as_deref()
    }

    /// Set (or clear, with blank input) the device profile.
    ///
    /// The name is kept as typed; storage routing lowercases it.
    pub fn set_device_profile(&mut self, profile: &str) {
        let trimmed = profile.trim();
        self.device_profile = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    /// Track a new entry.
    ///
    /// The same path may be tracked twice only with different profile settings,
    /// since those map to distinct storage locations.
    pub fn add_entry(&mut self, entry: TrackedEntry) -> Result<()> {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.path == entry.path && e.is_profile_specific == entry.is_profile_specific);
        if duplicate {
            return Err(SyncError::DuplicateEntry(entry.path).into());
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove_entry(&mut self, index: usize) -> Result<TrackedEntry> {
        if index >= self.entries.len() {
            return Err(SyncError::IndexOutOfRange(index).into());
        }
        Ok(self.entries.remove(index))
    }

    pub fn update_entry(&mut self, index: usize, entry: TrackedEntry) -> Result<()> {
        let slot = self
            .entries
            .get_mut(index)
            .ok_or(SyncError::IndexOutOfRange(index))?;
        *slot = entry;
        Ok(())
    }

    /// Flip an entry between shared and profile-specific storage.
    ///
    /// The entry's sync baseline is reset since it now points at a different
    /// manifest record.
    pub fn toggle_profile_specific(&mut self, index: usize) -> Result<bool> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(SyncError::IndexOutOfRange(index))?;
        entry.is_profile_specific = !entry.is_profile_specific;
        entry.local_version = 0;
        entry.last_known_hash.clear();
        Ok(entry.is_profile_specific)
    }

    /// Indices of every entry tracked at `path`.
    ///
    /// A path can be tracked twice: once shared and once profile-specific.
    pub fn find_entries(&self, path: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.path == path)
            .map(|(i, _)| i)
            .collect()
    }

    /// The one entry at `path`.
    ///
    /// `profile_specific` picks between the shared and the profile-specific
    /// entry; without it a path tracked both ways is ambiguous.
    pub fn resolve_entry(&self, path: &str, profile_specific: Option<bool>) -> Result<usize> {
        let matches: Vec<usize> = self
            .find_entries(path)
            .into_iter()
            .filter(|&i| {
                profile_specific.map_or(true, |p| self.entries[i].is_profile_specific == p)
            })
            .collect();

        match matches.as_slice() {
            [] => Err(SyncError::EntryNotFound(path.to_string()).into()),
            [index] => Ok(*index),
            _ => Err(SyncError::AmbiguousEntry(path.to_string()).into()),
        }
    }

    /// Indices for the given paths, or every entry when `paths` is empty.
    ///
    /// A path tracked both shared and profile-specific selects both entries.
    pub fn select(&self, paths: &[String]) -> Result<Vec<usize>> {
        if paths.is_empty() {
            return Ok((0..self.entries.len()).collect());
        }

        let mut indices = Vec::new();
        for path in paths {
            let found = self.find_entries(path);
            if found.is_empty() {
                return Err(SyncError::EntryNotFound(path.clone()).into());
            }
            for index in found {
                if !indices.contains(&index) {
                    indices.push(index);
                }
            }
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let default_repo = temp.path().join("repo");
        let settings =
            Settings::load_from(&temp.path().join("config.yaml"), &default_repo).unwrap();

        assert!(!settings.is_configured());
        assert_eq!(settings.repo_path, default_repo);
        assert!(settings.entries.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.yaml");

        let mut settings = Settings {
            repo_url: "git@github.com:alice/dotfiles.git".to_string(),
            repo_path: temp.path().join("clone"),
            ..Default::default()
        };
        settings.set_device_profile("Work");
        settings.add_entry(TrackedEntry::new("~/.zshrc", false)).unwrap();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path, Path::new("/unused")).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.profile(), Some("Work"));
    }

    #[test]
    fn test_accepts_repo_local_path_alias() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            "repo_url: https://example.com/d.git\n\
             repo_local_path: /tmp/clone\n\
             entries:\n  - path: ~/.vimrc\n    name: Vimrc\n    local_version: 2\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path, Path::new("/unused")).unwrap();
        assert_eq!(settings.repo_path, PathBuf::from("/tmp/clone"));
        assert_eq!(settings.entries[0].local_version, 2);
        assert!(settings.entries[0].last_known_hash.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "entries: [unterminated").unwrap();

        assert!(Settings::load_from(&path, Path::new("/unused")).is_err());
    }

    #[test]
    fn test_duplicate_entries_need_distinct_profile_flag() {
        let mut settings = Settings::default();
        settings.add_entry(TrackedEntry::new("~/.gitconfig", false)).unwrap();
        assert!(settings.add_entry(TrackedEntry::new("~/.gitconfig", false)).is_err());
        settings
            .add_entry(TrackedEntry::new("~/.gitconfig", false).with_profile_specific(true))
            .unwrap();
        assert_eq!(settings.entries.len(), 2);
    }

    #[test]
    fn test_toggle_resets_baseline() {
        let mut settings = Settings::default();
        let mut entry = TrackedEntry::new("~/.tmux.conf", false);
        entry.local_version = 4;
        entry.last_known_hash = "deadbeef".to_string();
        settings.add_entry(entry).unwrap();

        assert!(settings.toggle_profile_specific(0).unwrap());
        assert_eq!(settings.entries[0].local_version, 0);
        assert!(settings.entries[0].last_known_hash.is_empty());
        assert!(settings.toggle_profile_specific(5).is_err());
    }

    #[test]
    fn test_select_and_remove() {
        let mut settings = Settings::default();
        settings.add_entry(TrackedEntry::new("~/.a", false)).unwrap();
        settings.add_entry(TrackedEntry::new("~/.b", false)).unwrap();

        assert_eq!(settings.select(&[]).unwrap(), vec![0, 1]);
        assert_eq!(settings.select(&["~/.b".to_string()]).unwrap(), vec![1]);
        assert!(settings.select(&["~/.c".to_string()]).is_err());

        let removed = settings.remove_entry(0).unwrap();
        assert_eq!(removed.path, "~/.a");
        assert!(settings.remove_entry(3).is_err());
    }

    #[test]
    fn test_path_tracked_both_ways() {
        let mut settings = Settings::default();
        settings.add_entry(TrackedEntry::new("~/.zshrc", false)).unwrap();
        settings.add_entry(TrackedEntry::new("~/.gitconfig", false)).unwrap();
        settings
            .add_entry(TrackedEntry::new("~/.gitconfig", false).with_profile_specific(true))
            .unwrap();

        assert_eq!(settings.select(&["~/.gitconfig".to_string()]).unwrap(), vec![1, 2]);
        assert_eq!(
            settings
                .select(&["~/.gitconfig".to_string(), "~/.gitconfig".to_string()])
                .unwrap(),
            vec![1, 2]
        );
        assert_eq!(settings.find_entries("~/.gitconfig"), vec![1, 2]);

        assert_eq!(settings.resolve_entry("~/.gitconfig", Some(false)).unwrap(), 1);
        assert_eq!(settings.resolve_entry("~/.gitconfig", Some(true)).unwrap(), 2);
        assert_eq!(settings.resolve_entry("~/.zshrc", None).unwrap(), 0);

        let err = settings.resolve_entry("~/.gitconfig", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::AmbiguousEntry(_))
        ));
        let err = settings.resolve_entry("~/.zshrc", Some(true)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_device_profile_keeps_spelling() {
        let mut settings = Settings::default();
        settings.set_device_profile("  Work-Laptop ");
        assert_eq!(settings.profile(), Some("Work-Laptop"));

        settings.set_device_profile("   ");
        assert_eq!(settings.profile(), None);
    }
}
