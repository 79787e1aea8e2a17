use anyhow::{Context, Result};
use std::fs;

use crate::scm::SyncTransport;
use crate::settings::Settings;

use super::refresh;

/// Forget everything this machine tracks.
///
/// Removes the local clone and the tracked entries. The remote and the
/// configured repository URL are left alone, so a later backup starts fresh
/// from the remote state.
pub fn local_reset(settings: &mut Settings) -> Result<()> {
    if fs::symlink_metadata(&settings.repo_path).is_ok() {
        fs::remove_dir_all(&settings.repo_path).with_context(|| {
            format!("Failed to remove local clone at {}", settings.repo_path.display())
        })?;
        log::info!("Removed local clone at {}", settings.repo_path.display());
    }
    settings.entries.clear();
    Ok(())
}

/// Destroy the remote contents and history, leaving a single README commit.
///
/// Tracked entries are cleared too, since nothing they point at survives.
pub fn remote_wipe(settings: &mut Settings, transport: &dyn SyncTransport) -> Result<()> {
    refresh(settings, transport)?;
    transport
        .wipe_remote(&settings.repo_path)
        .context("Failed to wipe remote repository")?;
    settings.entries.clear();
    Ok(())
}
