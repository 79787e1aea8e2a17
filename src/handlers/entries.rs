//! Entry and setup command handlers
//!
//! Handles repository setup, the device profile, and adding, listing and
//! removing tracked entries.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::MultiSelect;
use std::path::PathBuf;

use crate::entry::{friendly_name, list_config_dirs, parse_tags, TrackedEntry};
use crate::error::SyncError;
use crate::paths::home_dir;
use crate::scm::{GitTransport, SyncTransport};
use crate::settings::Settings;

use super::{is_interactive, normalize_paths};

/// Handle init command
pub fn handle_init(
    repo_url: &str,
    repo_path: Option<PathBuf>,
    profile: Option<&str>,
) -> Result<()> {
    let mut settings = Settings::load().context("Failed to load settings")?;

    settings.repo_url = repo_url.trim().to_string();
    if let Some(path) = repo_path {
        settings.repo_path = path;
    }
    if let Some(profile) = profile {
        settings.set_device_profile(profile);
    }
    if !settings.is_configured() {
        return Err(SyncError::NotConfigured.into());
    }
    settings.save().context("Failed to save settings")?;

    println!("  {} local clone at {}...", "Preparing".cyan(), settings.repo_path.display());
    GitTransport::new()
        .ensure_local_copy(&settings.repo_url, &settings.repo_path)
        .context("Failed to clone the sync repository")?;

    println!("{}", "Sync repository ready".green().bold());
    println!("  {} {}", "Remote:".dimmed(), settings.repo_url);
    println!("  {} {}", "Clone:".dimmed(), settings.repo_path.display());
    match settings.profile() {
        Some(p) => println!("  {} {}", "Profile:".dimmed(), p),
        None => println!(
            "  {} not set (needed for profile-specific entries)",
            "Profile:".dimmed()
        ),
    }
    Ok(())
}

/// Handle add command
pub fn handle_add(
    paths: &[String],
    profile_specific: bool,
    name: Option<&str>,
    description: Option<&str>,
    tags: &[String],
) -> Result<()> {
    if paths.len() > 1 && name.is_some() {
        bail!("--name can only be used when adding a single path");
    }

    let home = home_dir()?;
    let mut settings = Settings::load().context("Failed to load settings")?;

    for raw in paths {
        let mut entry =
            TrackedEntry::from_path(raw, &home)?.with_profile_specific(profile_specific);
        if let Some(name) = name {
            entry.display_name = name.to_string();
        }
        entry.description = description.map(str::to_string);
        entry.tags = parse_tags(&tags.join(","));

        let label = format!("{} ({})", entry.path, entry.label());
        settings.add_entry(entry)?;
        println!("  {} {}", "✓".green(), label);
    }

    settings.save().context("Failed to save settings")?;
    Ok(())
}

/// Handle browse command: pick `~/.config` directories to track
///
/// `tags` are applied to every picked directory.
pub fn handle_browse(profile_specific: bool, tags: &[String]) -> Result<()> {
    let home = home_dir()?;
    let mut settings = Settings::load().context("Failed to load settings")?;

    let candidates: Vec<String> = list_config_dirs(&home)?
        .into_iter()
        .map(|dir| format!("~/.config/{}", dir))
        .filter(|path| {
            !settings
                .entries
                .iter()
                .any(|e| &e.path == path && e.is_profile_specific == profile_specific)
        })
        .collect();

    if candidates.is_empty() {
        println!("{}", "Every ~/.config directory is already tracked.".yellow());
        return Ok(());
    }

    if !is_interactive() {
        println!("{}", "Untracked ~/.config directories:".bold());
        for path in &candidates {
            println!("  {} ({})", path, friendly_name(path).dimmed());
        }
        println!("\nRun 'dotsync add <path>' to track one.");
        return Ok(());
    }

    let options: Vec<String> = candidates
        .iter()
        .map(|p| format!("{} ({})", p, friendly_name(p)))
        .collect();
    let picked = MultiSelect::new("Select directories to track:", options.clone())
        .with_help_message("Space to select, Enter to confirm")
        .prompt()
        .context("Failed to get selections")?;

    if picked.is_empty() {
        println!("{}", "Nothing selected.".yellow());
        return Ok(());
    }

    for choice in picked {
        let Some(pos) = options.iter().position(|o| *o == choice) else {
            continue;
        };
        let mut entry = TrackedEntry::new(candidates[pos].clone(), true)
            .with_profile_specific(profile_specific);
        entry.tags = parse_tags(&tags.join(","));
        println!("  {} {}", "✓".green(), entry.path);
        settings.add_entry(entry)?;
    }

    settings.save().context("Failed to save settings")?;
    Ok(())
}

/// Handle remove command
///
/// `profile_specific` picks one entry when the path is tracked both ways.
pub fn handle_remove(path: &str, profile_specific: Option<bool>) -> Result<()> {
    let home = home_dir()?;
    let mut settings = Settings::load().context("Failed to load settings")?;

    let wanted = normalize_paths(&[path.to_string()], &home).remove(0);
    let index = settings.resolve_entry(&wanted, profile_specific)?;
    let removed = settings.remove_entry(index)?;
    settings.save().context("Failed to save settings")?;

    println!("  {} No longer tracking {}", "✓".green(), removed.path);
    println!(
        "  {} Content already in the repository is left in place",
        "Note:".yellow()
    );
    Ok(())
}

/// Handle list command
pub fn handle_list() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;

    if settings.entries.is_empty() {
        println!("{}", "No tracked entries. Use 'dotsync add <path>' to start.".yellow());
        return Ok(());
    }

    println!("{}", "Tracked Entries".cyan().bold());
    println!("{}", "=".repeat(80).cyan());

    for (idx, entry) in settings.entries.iter().enumerate() {
        let kind = if entry.is_directory { "dir" } else { "file" };
        let scope = if entry.is_profile_specific {
            "profile".magenta()
        } else {
            "shared".blue()
        };
        println!(
            "{} {} {} [{}, {}]",
            format!("{}.", idx + 1).bold(),
            entry.label().bold(),
            entry.path.dimmed(),
            kind,
            scope
        );
        if let Some(desc) = &entry.description {
            println!("   {}", desc);
        }
        if !entry.tags.is_empty() {
            let tags: Vec<String> = entry.tags.iter().map(|t| format!("#{}", t)).collect();
            println!("   {} {}", "Tags:".dimmed(), tags.join(" ").cyan());
        }
        if entry.local_version > 0 {
            println!("   {} v{}", "Synced:".dimmed(), entry.local_version);
        }
    }

    Ok(())
}

/// Handle profile command: show or set the device profile
pub fn handle_profile(name: Option<&str>) -> Result<()> {
    let mut settings = Settings::load().context("Failed to load settings")?;

    match name {
        None => match settings.profile() {
            Some(p) => println!("{} {}", "Device profile:".bold(), p.green()),
            None => println!("{}", "No device profile set.".yellow()),
        },
        Some(name) => {
            settings.set_device_profile(name);
            settings.save().context("Failed to save settings")?;
            match settings.profile() {
                Some(p) => println!("  {} Device profile set to {}", "✓".green(), p.green()),
                None => println!("  {} Device profile cleared", "✓".green()),
            }
        }
    }
    Ok(())
}

/// Handle toggle-profile command
pub fn handle_toggle_profile(path: &str, profile_specific: Option<bool>) -> Result<()> {
    let home = home_dir()?;
    let mut settings = Settings::load().context("Failed to load settings")?;

    let wanted = normalize_paths(&[path.to_string()], &home).remove(0);
    let index = settings.resolve_entry(&wanted, profile_specific)?;
    if settings.find_entries(&wanted).len() > 1 {
        bail!(
            "{} is already tracked both shared and profile-specific; remove one instead",
            wanted
        );
    }
    let now_profile = settings.toggle_profile_specific(index)?;
    settings.save().context("Failed to save settings")?;

    let scope = if now_profile { "profile-specific" } else { "shared" };
    println!("  {} {} is now {}", "✓".green(), wanted, scope.bold());
    Ok(())
}

/// Handle tag command: replace an entry's tags with a comma-separated list
///
/// An empty list clears the tags.
pub fn handle_tag(path: &str, tags: &str, profile_specific: Option<bool>) -> Result<()> {
    let home = home_dir()?;
    let mut settings = Settings::load().context("Failed to load settings")?;

    let wanted = normalize_paths(&[path.to_string()], &home).remove(0);
    let index = settings.resolve_entry(&wanted, profile_specific)?;
    let mut entry = settings.entries[index].clone();
    entry.tags = parse_tags(tags);
    let cleared = entry.tags.is_empty();
    let shown = entry.tags.join(", ");
    settings.update_entry(index, entry)?;
    settings.save().context("Failed to save settings")?;

    if cleared {
        println!("  {} Cleared tags on {}", "✓".green(), wanted);
    } else {
        println!("  {} Tagged {} with {}", "✓".green(), wanted, shown.cyan());
    }
    Ok(())
}
