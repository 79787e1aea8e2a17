//! Repository layout routing.
//!
//! Every tracked entry maps to one storage key, which is both its directory
//! inside the sync repository and its manifest record key:
//!
//! - shared entries: `shared/<home-relative path>`
//! - profile-specific entries: `profiles/<profile>/<home-relative path>`

mod migrate;

pub use migrate::migrate_legacy_layout;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::entry::{normalize_profile, TrackedEntry};
use crate::error::SyncError;
use crate::paths::home_relative;

const SHARED_DIR: &str = "shared";
const PROFILES_DIR: &str = "profiles";

/// Which subtree of the repository an entry lives in
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Shared,
    /// Lowercased device profile name
    Profile(String),
}

/// Canonical location of an entry's shared state
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey {
    scope: Scope,
    rel_path: String,
}

impl StorageKey {
    pub fn shared(rel_path: impl Into<String>) -> Self {
        StorageKey {
            scope: Scope::Shared,
            rel_path: rel_path.into(),
        }
    }

    pub fn profile(profile: &str, rel_path: impl Into<String>) -> Self {
        StorageKey {
            scope: Scope::Profile(profile.trim().to_lowercase()),
            rel_path: rel_path.into(),
        }
    }

    /// Route an entry for the given device profile.
    ///
    /// Profile-specific entries are not routable until a profile is set.
    pub fn for_entry(
        entry: &TrackedEntry,
        profile: Option<&str>,
        home: &Path,
    ) -> Result<Self, SyncError> {
        let rel = home_relative(&entry.path, home);
        if !entry.is_profile_specific {
            return Ok(Self::shared(rel));
        }
        match profile.and_then(normalize_profile) {
            Some(p) => Ok(Self::profile(&p, rel)),
            None => Err(SyncError::NotRoutable {
                path: entry.path.clone(),
            }),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Home-relative path of the entry, slash-separated
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    /// Directory (or file) of the entry relative to the repository root
    pub fn repo_location(&self) -> PathBuf {
        let mut path = match &self.scope {
            Scope::Shared => PathBuf::from(SHARED_DIR),
            Scope::Profile(p) => PathBuf::from(PROFILES_DIR).join(p),
        };
        path.extend(self.rel_path.split('/'));
        path
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Shared => write!(f, "{}/{}", SHARED_DIR, self.rel_path),
            Scope::Profile(p) => write!(f, "{}/{}/{}", PROFILES_DIR, p, self.rel_path),
        }
    }
}

/// Error for strings that are not `shared/...` or `profiles/<name>/...`
#[derive(Debug, thiserror::Error)]
#[error("not a storage key: '{0}'")]
pub struct ParseKeyError(String);

impl FromStr for StorageKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseKeyError(s.to_string());
        let (head, rest) = s.split_once('/').ok_or_else(invalid)?;
        match head {
            SHARED_DIR if !rest.is_empty() => Ok(Self::shared(rest)),
            PROFILES_DIR => match rest.split_once('/') {
                Some((profile, rel)) if !profile.is_empty() && !rel.is_empty() => {
                    Ok(Self::profile(profile, rel))
                }
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for StorageKey {
    type Error = ParseKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.to_string()
    }
}

/// Routed location of an entry relative to the repository root
pub fn repo_location(
    entry: &TrackedEntry,
    profile: Option<&str>,
    home: &Path,
) -> Result<PathBuf, SyncError> {
    StorageKey::for_entry(entry, profile, home).map(|k| k.repo_location())
}

/// Manifest key of an entry
pub fn manifest_key(
    entry: &TrackedEntry,
    profile: Option<&str>,
    home: &Path,
) -> Result<StorageKey, SyncError> {
    StorageKey::for_entry(entry, profile, home)
}

/// Pre-`shared/` layout: content directly at the home-relative path
pub fn legacy_repo_location(entry: &TrackedEntry, home: &Path) -> PathBuf {
    PathBuf::from_iter(home_relative(&entry.path, home).split('/'))
}

/// Pre-`shared/` manifest key: the raw entry path
pub fn legacy_manifest_key(entry: &TrackedEntry) -> String {
    entry.path.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn home() -> PathBuf {
        PathBuf::from("/home/alice")
    }

    #[rstest]
    #[case::shared("~/.config/nvim", false, None, "shared/.config/nvim")]
    #[case::shared_ignores_profile("~/.zshrc", false, Some("Work"), "shared/.zshrc")]
    #[case::profile_lowercased("~/.gitconfig", true, Some("Work"), "profiles/work/.gitconfig")]
    #[case::absolute_path(
        "/home/alice/.config/kitty",
        true,
        Some("home"),
        "profiles/home/.config/kitty"
    )]
    fn test_routing(
        #[case] path: &str,
        #[case] profile_specific: bool,
        #[case] profile: Option<&str>,
        #[case] expected: &str,
    ) {
        let entry = TrackedEntry::new(path, false).with_profile_specific(profile_specific);
        let key = manifest_key(&entry, profile, &home()).unwrap();
        assert_eq!(key.to_string(), expected);

        let location = repo_location(&entry, profile, &home()).unwrap();
        assert_eq!(location, PathBuf::from_iter(expected.split('/')));
    }

    #[test]
    fn test_profile_specific_without_profile_is_not_routable() {
        let entry = TrackedEntry::new("~/.gitconfig", false).with_profile_specific(true);
        assert!(matches!(
            manifest_key(&entry, None, &home()),
            Err(SyncError::NotRoutable { .. })
        ));
        assert!(repo_location(&entry, Some("  "), &home()).is_err());
    }

    #[test]
    fn test_profile_flag_gives_disjoint_locations() {
        let shared = TrackedEntry::new("~/.gitconfig", false);
        let specific = shared.clone().with_profile_specific(true);

        let a = manifest_key(&shared, Some("work"), &home()).unwrap();
        let b = manifest_key(&specific, Some("work"), &home()).unwrap();
        assert_ne!(a, b);
        assert!(!a.repo_location().starts_with(b.repo_location()));
        assert!(!b.repo_location().starts_with(a.repo_location()));
    }

    #[test]
    fn test_key_string_round_trip() {
        for raw in ["shared/.config/fish", "profiles/laptop/.ssh/config"] {
            let key: StorageKey = raw.parse().unwrap();
            assert_eq!(key.to_string(), raw);
        }
        for bad in ["~/.zshrc", "shared/", "profiles/work", "profiles//x", "other/x"] {
            assert!(bad.parse::<StorageKey>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_legacy_locations() {
        let entry = TrackedEntry::new("~/.config/nvim", true);
        assert_eq!(legacy_repo_location(&entry, &home()), PathBuf::from(".config/nvim"));
        assert_eq!(legacy_manifest_key(&entry), "~/.config/nvim");
    }
}
