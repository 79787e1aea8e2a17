use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::conflict::{analyze, blocking_for_restore, ConflictReport, ConflictState};
use crate::engine::{EntryOutcome, ProgressEvent, RestoreEngine, SyncContext};
use crate::entry::TrackedEntry;
use crate::hash::hash_entry;
use crate::manifest::Manifest;
use crate::scm::SyncTransport;
use crate::settings::Settings;
use crate::storage::StorageKey;

use super::{refresh, remap_reports, require_profile};

/// One row of the restore picker
#[derive(Debug, Clone, Serialize)]
pub struct RestorePlanItem {
    /// Index into `settings.entries`
    pub index: usize,
    pub path: String,
    pub name: String,
    pub state: ConflictState,
    /// Routed content exists in the local clone
    pub in_repo: bool,
    pub repo_version: u64,
    pub updated_by: String,
    /// Pre-selected in the picker
    pub selected: bool,
}

/// Per-entry restore candidates for the current clone.
///
/// Entries without content in the repository (or that cannot be routed yet)
/// are listed but not pre-selected.
pub fn restore_plan(settings: &Settings, manifest: &Manifest, home: &Path) -> Vec<RestorePlanItem> {
    let profile = settings.profile();
    analyze(&settings.entries, manifest, profile, home)
        .into_iter()
        .zip(&settings.entries)
        .map(|(report, entry)| {
            let in_repo = report.key.as_ref().is_some_and(|k| {
                fs::symlink_metadata(settings.repo_path.join(k.repo_location())).is_ok()
            });
            let updated_by = report
                .key
                .as_ref()
                .map(|k| manifest.get_record(k).updated_by)
                .unwrap_or_default();

            RestorePlanItem {
                index: report.index,
                path: entry.path.clone(),
                name: entry.label().to_string(),
                state: report.state,
                in_repo,
                repo_version: report.repo_version,
                updated_by,
                selected: in_repo,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Entry paths to restore; empty means every entry present in the repository
    pub paths: Vec<String>,
    /// Overwrite local edits that were never backed up
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreSummary {
    pub restored: usize,
    pub failed: usize,
    pub outcomes: Vec<EntryOutcome>,
}

#[derive(Debug, Clone)]
pub enum RestoreOutcome {
    /// Nothing was copied: these entries hold local changes a restore would
    /// overwrite.
    NeedsConfirmation(Vec<ConflictReport>),
    Completed(RestoreSummary),
}

/// Copy repository content back over the local files.
///
/// After each successful entry its baseline is taken from the manifest so
/// the next analysis compares against what was just restored.
pub fn restore(
    settings: &mut Settings,
    transport: &dyn SyncTransport,
    home: &Path,
    opts: &RestoreOptions,
    on_event: &mut dyn FnMut(&ProgressEvent),
) -> Result<RestoreOutcome> {
    let mut indices = settings.select(&opts.paths)?;
    require_profile(settings, &indices)?;

    let manifest = refresh(settings, transport)?;
    let repo_path = settings.repo_path.clone();
    let profile = settings.device_profile.clone();

    if opts.paths.is_empty() {
        let plan = restore_plan(settings, &manifest, home);
        indices.retain(|&i| plan[i].selected);
    }

    let selected: Vec<TrackedEntry> =
        indices.iter().map(|&i| settings.entries[i].clone()).collect();

    let mut reports = analyze(&selected, &manifest, profile.as_deref(), home);
    remap_reports(&mut reports, &indices);
    let blocking: Vec<ConflictReport> =
        blocking_for_restore(&reports).into_iter().cloned().collect();
    if !blocking.is_empty() && !opts.confirmed {
        log::info!("Restore needs confirmation for {} entries", blocking.len());
        return Ok(RestoreOutcome::NeedsConfirmation(blocking));
    }

    let ctx = SyncContext::new(home, &repo_path, profile.as_deref());
    let mut summary = RestoreSummary::default();
    for event in RestoreEngine::run(selected, ctx) {
        on_event(&event);
        if let ProgressEvent::Finished(outcome) = event {
            summary.outcomes.push(outcome);
        }
    }

    for outcome in &summary.outcomes {
        if !outcome.succeeded() {
            summary.failed += 1;
            continue;
        }
        summary.restored += 1;

        let entry = &mut settings.entries[indices[outcome.index]];
        let key = StorageKey::for_entry(entry, profile.as_deref(), home)?;
        let record = manifest.get_record(&key);
        entry.local_version = record.version;
        entry.last_known_hash = if record.content_hash.is_empty() {
            // Content predates hash tracking; remember what is on disk now
            hash_entry(entry, home).unwrap_or_default()
        } else {
            record.content_hash
        };
    }

    Ok(RestoreOutcome::Completed(summary))
}
