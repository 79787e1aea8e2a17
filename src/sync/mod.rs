//! User-level workflows tying the transport, manifest, analyzer and engines
//! together.
//!
//! Every workflow takes the settings, a transport and the home directory
//! explicitly. Workflows mutate the in-memory [`Settings`] only; persisting
//! them is left to the caller.

mod backup;
mod reset;
mod restore;
mod status;

pub use backup::{backup, BackupOptions, BackupOutcome, BackupSummary};
pub use reset::{local_reset, remote_wipe};
pub use restore::{
    restore, restore_plan, RestoreOptions, RestoreOutcome, RestorePlanItem, RestoreSummary,
};
pub use status::{status_overview, StatusOverview, StatusRow, UntrackedRecord};

use anyhow::{Context, Result};

use crate::conflict::ConflictReport;
use crate::error::SyncError;
use crate::manifest::Manifest;
use crate::scm::SyncTransport;
use crate::settings::Settings;

/// Fail with [`SyncError::ProfileRequired`] if any selected entry needs a
/// device profile that is not set.
pub fn require_profile(settings: &Settings, indices: &[usize]) -> Result<(), SyncError> {
    if settings.profile().is_some() {
        return Ok(());
    }
    let entries: Vec<String> = indices
        .iter()
        .filter_map(|&i| settings.entries.get(i))
        .filter(|e| e.is_profile_specific)
        .map(|e| e.path.clone())
        .collect();

    if entries.is_empty() {
        Ok(())
    } else {
        Err(SyncError::ProfileRequired { entries })
    }
}

/// Bring the local clone up to date and load its manifest.
pub fn refresh(settings: &Settings, transport: &dyn SyncTransport) -> Result<Manifest> {
    if !settings.is_configured() {
        return Err(SyncError::NotConfigured.into());
    }
    transport
        .ensure_local_copy(&settings.repo_url, &settings.repo_path)
        .with_context(|| format!("Failed to sync repository {}", settings.repo_url))?;
    Manifest::load(&settings.repo_path)
}

/// Point report indices at `settings.entries` instead of the analyzed subset
fn remap_reports(reports: &mut [ConflictReport], indices: &[usize]) {
    for report in reports {
        report.index = indices[report.index];
    }
}
