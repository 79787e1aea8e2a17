use std::fs;

use crate::copy::copy_entry;
use crate::entry::TrackedEntry;
use crate::paths::expand_home;
use crate::storage::StorageKey;

use super::{run_batch, EntryOutcome, ProgressEvent, ProgressStream, SyncContext};

/// Copies routed repository content back over the local filesystem.
///
/// Restores overlay: local files absent from the repository are left alone.
pub struct RestoreEngine;

impl RestoreEngine {
    /// Restore `entries` on a background thread
    pub fn run(entries: Vec<TrackedEntry>, ctx: SyncContext) -> ProgressStream {
        ProgressStream::spawn(move |on_event| {
            Self::run_blocking(&entries, &ctx, on_event);
        })
    }

    /// Restore `entries` on the calling thread
    pub fn run_blocking(
        entries: &[TrackedEntry],
        ctx: &SyncContext,
        on_event: &mut dyn FnMut(&ProgressEvent),
    ) -> Vec<EntryOutcome> {
        run_batch(entries, on_event, |entry, outcome| {
            Self::restore_entry(entry, ctx, outcome)
        })
    }

    fn restore_entry(entry: &TrackedEntry, ctx: &SyncContext, outcome: &mut EntryOutcome) {
        let key = match StorageKey::for_entry(entry, ctx.profile(), &ctx.home) {
            Ok(key) => key,
            Err(err) => {
                outcome.error = Some(err.to_string());
                return;
            }
        };

        let src = ctx.repo_path.join(key.repo_location());
        if fs::symlink_metadata(&src).is_err() {
            outcome.error = Some(format!("{} is not present in the repository", key));
            return;
        }
        let dst = expand_home(&entry.path, &ctx.home);

        if let Err(err) = copy_entry(&src, &dst, &mut outcome.stats) {
            outcome.error = Some(format!("{:#}", err));
            return;
        }

        log::debug!("Restored {} -> {}", key, dst.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_restore_reads_profile_location() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        fs::create_dir_all(repo.path().join("profiles/home")).unwrap();
        fs::write(repo.path().join("profiles/home/.gitconfig"), "[user] name = me").unwrap();

        let entries = vec![TrackedEntry::new("~/.gitconfig", false).with_profile_specific(true)];
        let ctx = SyncContext::new(home.path(), repo.path(), Some("home"));
        let outcomes = RestoreEngine::run_blocking(&entries, &ctx, &mut |_| {});

        assert!(outcomes[0].succeeded());
        assert_eq!(
            fs::read_to_string(home.path().join(".gitconfig")).unwrap(),
            "[user] name = me"
        );
    }

    #[test]
    fn test_restore_overlays_directory() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        let stored = repo.path().join("shared/.config/fish");
        fs::create_dir_all(&stored).unwrap();
        fs::write(stored.join("config.fish"), "set -x A 1").unwrap();

        let local = home.path().join(".config/fish");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("fish_variables"), "local only").unwrap();

        let entries = vec![TrackedEntry::new("~/.config/fish", true)];
        let ctx = SyncContext::new(home.path(), repo.path(), None);
        let outcomes = RestoreEngine::run_blocking(&entries, &ctx, &mut |_| {});

        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[0].stats.copied, 1);
        assert_eq!(fs::read_to_string(local.join("config.fish")).unwrap(), "set -x A 1");
        assert!(local.join("fish_variables").exists());
    }

    #[test]
    fn test_entry_missing_from_repo_fails() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();

        let entries = vec![TrackedEntry::new("~/.tmux.conf", false)];
        let ctx = SyncContext::new(home.path(), repo.path(), None);
        let outcomes = RestoreEngine::run(entries, ctx).outcomes();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("not present in the repository"));
    }

    #[test]
    #[cfg(unix)]
    fn test_repo_symlink_does_not_replace_local_directory() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        let stored = repo.path().join("shared/.config/app");
        fs::create_dir_all(&stored).unwrap();
        fs::write(stored.join("app.toml"), "theme = 'nord'").unwrap();
        std::os::unix::fs::symlink("../elsewhere", stored.join("themes")).unwrap();

        let local = home.path().join(".config/app");
        fs::create_dir_all(local.join("themes")).unwrap();
        fs::write(local.join("themes/mine.toml"), "bg = 'black'").unwrap();

        let entries = vec![TrackedEntry::new("~/.config/app", true)];
        let ctx = SyncContext::new(home.path(), repo.path(), None);
        let outcomes = RestoreEngine::run_blocking(&entries, &ctx, &mut |_| {});

        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[0].stats.copied, 1);
        assert_eq!(outcomes[0].stats.skipped, 1);
        assert!(local.join("themes/mine.toml").exists());
        assert_eq!(fs::read_to_string(local.join("app.toml")).unwrap(), "theme = 'nord'");
    }
}
