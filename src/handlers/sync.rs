//! Backup, restore and status command handlers

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use inquire::Text;

use crate::conflict::{ConflictReport, ConflictState};
use crate::engine::{EntryOutcome, ProgressEvent};
use crate::error::SyncError;
use crate::logger::log_to_file;
use crate::paths::home_dir;
use crate::scm::GitTransport;
use crate::settings::Settings;
use crate::sync::{self, BackupOptions, BackupOutcome, RestoreOptions, RestoreOutcome};

use super::{confirm, is_interactive, normalize_paths};

/// Handle backup command
pub fn handle_backup(paths: &[String], assume_yes: bool, message: Option<&str>) -> Result<()> {
    let home = home_dir()?;
    let mut settings = Settings::load().context("Failed to load settings")?;
    let transport = GitTransport::new();

    let mut opts = BackupOptions {
        paths: normalize_paths(paths, &home),
        confirmed: assume_yes,
        message: message.map(str::to_string),
    };
    prompt_for_profile_if_needed(&mut settings, &opts.paths)?;

    println!("{}", "Backing up dotfiles...".cyan().bold());

    let outcome = loop {
        let result = sync::backup(&mut settings, &transport, &home, &opts, &mut print_progress);
        // Entries copied before a failed push keep their new baseline
        settings.save().context("Failed to save settings")?;

        match result? {
            BackupOutcome::Completed(summary) => break summary,
            BackupOutcome::NeedsConfirmation(reports) => {
                print_conflicts(
                    &reports,
                    "The repository has changes this machine has not restored:",
                );
                if !confirm(
                    "Overwrite the repository copies with your local files?",
                    "Restore first to keep the newer repository content",
                    false,
                )? {
                    println!("\n{}", "Backup cancelled.".yellow());
                    return Ok(());
                }
                opts.confirmed = true;
            }
        }
    };

    println!();
    println!(
        "  {} {} changed, {} unchanged, {} failed",
        "Summary:".bold(),
        outcome.changed.to_string().green(),
        outcome.unchanged,
        colored_count(outcome.failed)
    );
    if outcome.migrated > 0 {
        println!("  {} {} entries moved to the new layout", "Migrated:".bold(), outcome.migrated);
    }
    if outcome.committed {
        println!("{}", "Backup pushed".green().bold());
    } else {
        println!("{}", "Nothing new to push".yellow());
    }

    log_to_file(&format!(
        "backup: {} changed, {} unchanged, {} failed, committed={}",
        outcome.changed, outcome.unchanged, outcome.failed, outcome.committed
    ))?;
    Ok(())
}

/// Handle restore command
pub fn handle_restore(paths: &[String], assume_yes: bool) -> Result<()> {
    let home = home_dir()?;
    let mut settings = Settings::load().context("Failed to load settings")?;
    let transport = GitTransport::new();

    let mut opts = RestoreOptions {
        paths: normalize_paths(paths, &home),
        confirmed: assume_yes,
    };
    prompt_for_profile_if_needed(&mut settings, &opts.paths)?;

    println!("{}", "Restoring dotfiles...".cyan().bold());

    let summary = loop {
        match sync::restore(&mut settings, &transport, &home, &opts, &mut print_progress)? {
            RestoreOutcome::Completed(summary) => break summary,
            RestoreOutcome::NeedsConfirmation(reports) => {
                print_conflicts(
                    &reports,
                    "These entries have local changes that were never backed up:",
                );
                if !confirm(
                    "Overwrite your local changes with the repository copies?",
                    "Back up first to keep your local edits",
                    false,
                )? {
                    println!("\n{}", "Restore cancelled.".yellow());
                    return Ok(());
                }
                opts.confirmed = true;
            }
        }
    };

    settings.save().context("Failed to save settings")?;

    println!();
    if summary.outcomes.is_empty() {
        println!("{}", "Nothing in the repository to restore.".yellow());
    } else {
        println!(
            "  {} {} restored, {} failed",
            "Summary:".bold(),
            summary.restored.to_string().green(),
            colored_count(summary.failed)
        );
    }

    log_to_file(&format!(
        "restore: {} restored, {} failed",
        summary.restored, summary.failed
    ))?;
    Ok(())
}

/// Handle status command
pub fn handle_status(json: bool) -> Result<()> {
    let home = home_dir()?;
    let settings = Settings::load().context("Failed to load settings")?;

    let manifest = sync::refresh(&settings, &GitTransport::new())?;
    let overview = sync::status_overview(&settings, &manifest, &home);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&overview).context("Failed to serialize status")?
        );
        return Ok(());
    }

    println!("{}", "Sync Status".cyan().bold());
    println!("{}", "=".repeat(80).cyan());
    println!(
        "{} {}",
        "Device profile:".bold(),
        overview.device_profile.as_deref().unwrap_or("(none)")
    );

    if overview.rows.is_empty() {
        println!("\n{}", "No tracked entries.".yellow());
    }
    for row in &overview.rows {
        println!("\n{} {}", state_badge(row.state), row.name.bold());
        println!("   {} {}", "Path:".dimmed(), row.path);
        if let Some(key) = &row.key {
            println!("   {} {}", "Stored at:".dimmed(), key);
        }
        println!(
            "   {} local v{} / repo v{}",
            "Version:".dimmed(),
            row.local_version,
            row.repo_version
        );
        if let Some(at) = row.updated_at {
            println!(
                "   {} {} by {}",
                "Updated:".dimmed(),
                at.format("%Y-%m-%d %H:%M:%S UTC"),
                row.updated_by
            );
        }
    }

    if !overview.untracked.is_empty() {
        println!("\n{}", "Also in the repository:".bold());
        for record in &overview.untracked {
            let owner = match &record.profile {
                Some(p) => format!("profile {}", p),
                None => "not tracked here".to_string(),
            };
            println!(
                "  {} v{} ({}, last by {})",
                record.key,
                record.version,
                owner.dimmed(),
                record.updated_by
            );
        }
    }

    Ok(())
}

/// Ask for a device profile when profile-specific entries are selected
/// without one.
fn prompt_for_profile_if_needed(settings: &mut Settings, paths: &[String]) -> Result<()> {
    let indices = settings.select(paths)?;
    let err = match sync::require_profile(settings, &indices) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    if !is_interactive() {
        return Err(err.into());
    }

    if let SyncError::ProfileRequired { entries } = &err {
        println!("{}", "Some entries are stored per device:".yellow());
        for path in entries {
            println!("  - {}", path);
        }
    }
    let name = Text::new("Device profile for this machine (e.g. work, home):")
        .prompt()
        .context("Failed to read device profile")?;
    settings.set_device_profile(&name);
    if settings.profile().is_none() {
        return Err(err.into());
    }
    settings.save().context("Failed to save settings")?;
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::Started { index, total, path } => {
            log::debug!("[{}/{}] {}", index + 1, total, path);
        }
        ProgressEvent::Finished(outcome) => print_outcome(outcome),
    }
}

fn print_outcome(outcome: &EntryOutcome) {
    let counter = format!("[{}/{}]", outcome.index + 1, outcome.total);
    match &outcome.error {
        Some(err) => println!(
            "  {} {} {} {}",
            counter.dimmed(),
            "✗".red(),
            outcome.name,
            err.red()
        ),
        None => {
            println!(
                "  {} {} {} ({} files, {})",
                counter.dimmed(),
                "✓".green(),
                outcome.name,
                outcome.stats.copied,
                format_bytes(outcome.stats.bytes_copied)
            );
            if let Some(warning) = &outcome.warning {
                println!("      {} {}", "Warning:".yellow(), warning);
            }
            for reason in &outcome.stats.skip_reasons {
                println!("      {} {}", "Skipped:".yellow(), reason);
            }
        }
    }
}

fn print_conflicts(reports: &[ConflictReport], heading: &str) {
    println!("\n{}", heading.yellow().bold());
    for report in reports {
        println!(
            "  {} {} (local v{}, repo v{})",
            state_badge(report.state),
            report.path,
            report.local_version,
            report.repo_version
        );
    }
    println!();
}

fn state_badge(state: ConflictState) -> ColoredString {
    let label = format!("[{}]", state.label());
    match state {
        ConflictState::Clean => label.green(),
        ConflictState::NewerInRepo => label.cyan(),
        ConflictState::ModifiedLocal => label.yellow(),
        ConflictState::Conflict => label.red().bold(),
        ConflictState::Unknown => label.dimmed(),
    }
}

fn colored_count(n: usize) -> ColoredString {
    if n > 0 {
        n.to_string().red()
    } else {
        n.to_string().normal()
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
