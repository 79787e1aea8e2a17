use std::fs;
use std::path::{Component, Path};

use crate::entry::TrackedEntry;
use crate::error::MigrationError;
use crate::manifest::Manifest;

use super::{legacy_manifest_key, legacy_repo_location, StorageKey, PROFILES_DIR, SHARED_DIR};

/// Move entries from the old flat layout (content directly at the
/// home-relative path) into `shared/` or `profiles/<profile>/`, rewriting
/// their manifest keys to match.
///
/// Runs before every backup and is a no-op once nothing is left at a legacy
/// location. Entries that cannot be routed yet are skipped; a filesystem error
/// aborts the pass and reports how many entries were already moved.
pub fn migrate_legacy_layout(
    entries: &[TrackedEntry],
    profile: Option<&str>,
    repo_path: &Path,
    home: &Path,
    manifest: &mut Manifest,
) -> Result<usize, MigrationError> {
    let mut migrated = 0;

    for entry in entries {
        let key = match StorageKey::for_entry(entry, profile, home) {
            Ok(key) => key,
            Err(err) => {
                log::debug!("Not migrating {}: {}", entry.path, err);
                continue;
            }
        };

        let legacy_rel = legacy_repo_location(entry, home);
        if shadows_layout_root(&legacy_rel) {
            continue;
        }

        let legacy_full = repo_path.join(&legacy_rel);
        let new_full = repo_path.join(key.repo_location());

        if fs::symlink_metadata(&legacy_full).is_err() {
            continue;
        }
        if fs::symlink_metadata(&new_full).is_ok() {
            continue;
        }

        if let Some(parent) = new_full.parent() {
            fs::create_dir_all(parent).map_err(|source| MigrationError {
                migrated,
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::rename(&legacy_full, &new_full).map_err(|source| MigrationError {
            migrated,
            path: legacy_full.clone(),
            source,
        })?;

        manifest.rename_legacy_key(&legacy_manifest_key(entry), &key);
        log::info!("Migrated {} -> {}", legacy_rel.display(), key);
        migrated += 1;
    }

    Ok(migrated)
}

/// A legacy path whose first component is `shared` or `profiles` would collide
/// with the new layout itself.
fn shadows_layout_root(rel: &Path) -> bool {
    matches!(
        rel.components().next(),
        Some(Component::Normal(first)) if first == SHARED_DIR || first == PROFILES_DIR
    )
}
