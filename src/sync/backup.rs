use anyhow::{Context, Result};
use std::path::Path;

use crate::conflict::{analyze, blocking_for_backup, ConflictReport};
use crate::engine::{BackupEngine, EntryOutcome, ProgressEvent, SyncContext};
use crate::entry::TrackedEntry;
use crate::manifest::machine_id;
use crate::scm::SyncTransport;
use crate::settings::Settings;
use crate::storage::{migrate_legacy_layout, StorageKey};

use super::{refresh, remap_reports, require_profile};

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Entry paths to back up; empty means every tracked entry
    pub paths: Vec<String>,
    /// Proceed even if the repository holds content this machine has not seen
    pub confirmed: bool,
    /// Commit message; a default naming this machine is used otherwise
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BackupSummary {
    /// Entries whose content differed from the manifest and were bumped
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Entries moved out of the legacy flat layout first
    pub migrated: usize,
    /// Whether a commit was pushed
    pub committed: bool,
    pub outcomes: Vec<EntryOutcome>,
}

#[derive(Debug, Clone)]
pub enum BackupOutcome {
    /// Nothing was copied: these entries would overwrite newer repository
    /// content and need explicit confirmation.
    NeedsConfirmation(Vec<ConflictReport>),
    Completed(BackupSummary),
}

/// Back up tracked entries and push the result.
///
/// Aborts before touching anything local if the transport fails. The
/// manifest is only saved and pushed when at least one entry actually
/// changed, so repeating a backup of unchanged files is a no-op. Work an
/// earlier run failed to push is pushed by the next one.
///
/// Entry bookkeeping in `settings` is updated before the push, so callers
/// should persist `settings` even when this returns a push error.
pub fn backup(
    settings: &mut Settings,
    transport: &dyn SyncTransport,
    home: &Path,
    opts: &BackupOptions,
    on_event: &mut dyn FnMut(&ProgressEvent),
) -> Result<BackupOutcome> {
    let indices = settings.select(&opts.paths)?;
    require_profile(settings, &indices)?;

    let mut manifest = refresh(settings, transport)?;
    let repo_path = settings.repo_path.clone();
    let profile = settings.device_profile.clone();

    let migrated = match migrate_legacy_layout(
        &settings.entries,
        profile.as_deref(),
        &repo_path,
        home,
        &mut manifest,
    ) {
        Ok(n) => n,
        Err(err) => {
            // Moves that already happened must keep their manifest keys
            if err.migrated > 0 {
                manifest.save(&repo_path)?;
            }
            return Err(err.into());
        }
    };
    if migrated > 0 {
        log::info!("Migrated {} entries out of the legacy layout", migrated);
        manifest.save(&repo_path)?;
    }

    let selected: Vec<TrackedEntry> =
        indices.iter().map(|&i| settings.entries[i].clone()).collect();

    let mut reports = analyze(&selected, &manifest, profile.as_deref(), home);
    remap_reports(&mut reports, &indices);
    let blocking: Vec<ConflictReport> =
        blocking_for_backup(&reports).into_iter().cloned().collect();
    if !blocking.is_empty() && !opts.confirmed {
        log::info!("Backup needs confirmation for {} entries", blocking.len());
        return Ok(BackupOutcome::NeedsConfirmation(blocking));
    }

    let ctx = SyncContext::new(home, &repo_path, profile.as_deref());
    let mut outcomes = Vec::with_capacity(selected.len());
    for event in BackupEngine::run(selected, ctx) {
        on_event(&event);
        if let ProgressEvent::Finished(outcome) = event {
            outcomes.push(outcome);
        }
    }

    let mut summary = BackupSummary {
        migrated,
        ..Default::default()
    };

    for outcome in &outcomes {
        if !outcome.succeeded() {
            summary.failed += 1;
            continue;
        }
        let Some(hash) = outcome.content_hash.as_deref() else {
            log::warn!(
                "{} was copied but could not be hashed, not recording it",
                outcome.path
            );
            summary.unchanged += 1;
            continue;
        };

        let entry = &mut settings.entries[indices[outcome.index]];
        let key = StorageKey::for_entry(entry, profile.as_deref(), home)?;
        if manifest.bump_version(&key, hash) {
            summary.changed += 1;
        } else {
            summary.unchanged += 1;
        }
        entry.local_version = manifest.get_version(&key);
        entry.last_known_hash = hash.to_string();
    }
    summary.outcomes = outcomes;

    if summary.changed > 0 || migrated > 0 {
        manifest.save(&repo_path)?;
    }

    // A previous backup may have committed or saved without managing to push
    let pending = summary.changed > 0
        || migrated > 0
        || transport
            .has_unpushed(&repo_path)
            .context("Failed to inspect the local clone")?;
    if pending {
        let message = opts
            .message
            .clone()
            .unwrap_or_else(|| default_message(summary.changed));
        summary.committed = transport
            .commit_and_push(&repo_path, &message)
            .context("Failed to push backup")?;
    } else {
        log::info!("Nothing changed, skipping commit");
    }

    Ok(BackupOutcome::Completed(summary))
}

fn default_message(changed: usize) -> String {
    format!(
        "Backup from {}: {} entr{} updated",
        machine_id(),
        changed,
        if changed == 1 { "y" } else { "ies" }
    )
}
