use std::fs;

use crate::copy::{describe_skipped_dir, replace_with_copy};
use crate::entry::TrackedEntry;
use crate::hash::hash_path;
use crate::paths::expand_home;
use crate::storage::StorageKey;

use super::{run_batch, EntryOutcome, ProgressEvent, ProgressStream, SyncContext};

/// Copies tracked entries into their routed repository location
pub struct BackupEngine;

impl BackupEngine {
    /// Back up `entries` on a background thread
    pub fn run(entries: Vec<TrackedEntry>, ctx: SyncContext) -> ProgressStream {
        ProgressStream::spawn(move |on_event| {
            Self::run_blocking(&entries, &ctx, on_event);
        })
    }

    /// Back up `entries` on the calling thread
    pub fn run_blocking(
        entries: &[TrackedEntry],
        ctx: &SyncContext,
        on_event: &mut dyn FnMut(&ProgressEvent),
    ) -> Vec<EntryOutcome> {
        run_batch(entries, on_event, |entry, outcome| {
            Self::backup_entry(entry, ctx, outcome)
        })
    }

    fn backup_entry(entry: &TrackedEntry, ctx: &SyncContext, outcome: &mut EntryOutcome) {
        let key = match StorageKey::for_entry(entry, ctx.profile(), &ctx.home) {
            Ok(key) => key,
            Err(err) => {
                outcome.error = Some(err.to_string());
                return;
            }
        };

        let src = expand_home(&entry.path, &ctx.home);
        let src_meta = match fs::symlink_metadata(&src) {
            Ok(m) => m,
            Err(err) => {
                outcome.error = Some(format!("source missing: {}: {}", src.display(), err));
                return;
            }
        };
        let dst = ctx.repo_path.join(key.repo_location());

        // Replace the previous copy so files deleted locally leave the repo too
        if let Err(err) = replace_with_copy(&src, &dst, &mut outcome.stats) {
            outcome.error = Some(format!("{:#}", err));
            return;
        }

        if src_meta.is_dir() && outcome.stats.copied == 0 {
            outcome.warning = Some(describe_skipped_dir(&src));
        }

        match hash_path(&src) {
            Ok(hash) => outcome.content_hash = Some(hash),
            Err(err) => {
                outcome.warning = Some(format!("could not hash source: {:#}", err));
            }
        }

        log::debug!("Backed up {} -> {}", entry.path, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_dir;
    use std::path::Path;
    use tempfile::TempDir;

    fn ctx(home: &Path, repo: &Path, profile: Option<&str>) -> SyncContext {
        SyncContext::new(home, repo, profile)
    }

    #[test]
    fn test_backup_routes_shared_and_profile_entries() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        fs::write(home.path().join(".zshrc"), "zsh").unwrap();
        fs::write(home.path().join(".gitconfig"), "[user]").unwrap();

        let entries = vec![
            TrackedEntry::new("~/.zshrc", false),
            TrackedEntry::new("~/.gitconfig", false).with_profile_specific(true),
        ];
        let c = ctx(home.path(), repo.path(), Some("Work"));
        let outcomes = BackupEngine::run_blocking(&entries, &c, &mut |_| {});

        assert!(outcomes.iter().all(|o| o.succeeded()));
        assert!(repo.path().join("shared/.zshrc").exists());
        assert!(repo.path().join("profiles/work/.gitconfig").exists());
        assert!(outcomes[0].content_hash.is_some());
    }

    #[test]
    fn test_missing_source_fails_entry_not_batch() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        fs::write(home.path().join(".bashrc"), "bash").unwrap();

        let entries = vec![
            TrackedEntry::new("~/.missing", false),
            TrackedEntry::new("~/.bashrc", false),
        ];
        let outcomes =
            BackupEngine::run_blocking(&entries, &ctx(home.path(), repo.path(), None), &mut |_| {});

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].error.as_deref().unwrap().contains("source missing"));
        assert!(outcomes[1].succeeded());
    }

    #[test]
    fn test_deleted_local_files_leave_repo() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        let nvim = home.path().join(".config/nvim");
        fs::create_dir_all(&nvim).unwrap();
        fs::write(nvim.join("init.lua"), "a").unwrap();
        fs::write(nvim.join("old.lua"), "b").unwrap();

        let entries = vec![TrackedEntry::new("~/.config/nvim", true)];
        let c = ctx(home.path(), repo.path(), None);
        BackupEngine::run_blocking(&entries, &c, &mut |_| {});

        fs::remove_file(nvim.join("old.lua")).unwrap();
        let outcomes = BackupEngine::run_blocking(&entries, &c, &mut |_| {});

        let stored = repo.path().join("shared/.config/nvim");
        assert!(!stored.join("old.lua").exists());
        assert_eq!(outcomes[0].content_hash.as_deref(), Some(hash_dir(&nvim).unwrap().as_str()));
        assert_eq!(hash_dir(&stored).unwrap(), hash_dir(&nvim).unwrap());
    }

    #[test]
    fn test_empty_directory_gets_warning() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        fs::create_dir_all(home.path().join(".config/empty")).unwrap();

        let entries = vec![TrackedEntry::new("~/.config/empty", true)];
        let outcomes =
            BackupEngine::run_blocking(&entries, &ctx(home.path(), repo.path(), None), &mut |_| {});

        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[0].warning.as_deref(), Some("no regular files found"));
    }

    #[test]
    fn test_events_are_ordered_and_complete() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        for name in [".a", ".b", ".c"] {
            fs::write(home.path().join(name), name).unwrap();
        }
        let entries: Vec<_> = [".a", ".missing", ".c"]
            .iter()
            .map(|n| TrackedEntry::new(format!("~/{}", n), false))
            .collect();

        let events: Vec<_> =
            BackupEngine::run(entries, ctx(home.path(), repo.path(), None)).collect();
        assert_eq!(events.len(), 6);

        let finished: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Finished(o) => Some(o.index),
                ProgressEvent::Started { .. } => None,
            })
            .collect();
        assert_eq!(finished, vec![0, 1, 2]);
        assert!(matches!(&events[0], ProgressEvent::Started { index: 0, total: 3, .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_entry_keeps_previous_repo_copy() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        fs::write(home.path().join(".a"), "a1").unwrap();
        fs::write(home.path().join(".b"), "b1").unwrap();

        let entries = vec![TrackedEntry::new("~/.a", false), TrackedEntry::new("~/.b", false)];
        let c = ctx(home.path(), repo.path(), None);
        BackupEngine::run_blocking(&entries, &c, &mut |_| {});

        fs::remove_file(home.path().join(".a")).unwrap();
        let _listener = std::os::unix::net::UnixListener::bind(home.path().join(".a")).unwrap();
        fs::write(home.path().join(".b"), "b2").unwrap();
        let outcomes = BackupEngine::run_blocking(&entries, &c, &mut |_| {});

        assert!(!outcomes[0].succeeded());
        assert!(outcomes[1].succeeded());
        assert_eq!(fs::read_to_string(repo.path().join("shared/.a")).unwrap(), "a1");
        assert_eq!(fs::read_to_string(repo.path().join("shared/.b")).unwrap(), "b2");
    }

    #[test]
    #[cfg(unix)]
    fn test_one_special_file_among_nine_is_skipped() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        let app = home.path().join(".config/app");
        fs::create_dir_all(&app).unwrap();
        for i in 0..9 {
            fs::write(app.join(format!("file{}.conf", i)), "ok").unwrap();
        }
        let _listener = std::os::unix::net::UnixListener::bind(app.join("agent.sock")).unwrap();

        let entries = vec![TrackedEntry::new("~/.config/app", true)];
        let outcomes =
            BackupEngine::run_blocking(&entries, &ctx(home.path(), repo.path(), None), &mut |_| {});

        assert!(outcomes[0].succeeded());
        assert!(outcomes[0].warning.is_none());
        assert_eq!(outcomes[0].stats.copied, 9);
        assert_eq!(outcomes[0].stats.skipped, 1);
        assert!(outcomes[0].stats.skip_reasons[0].starts_with("agent.sock"));
    }
}
