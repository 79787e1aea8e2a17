//! Reset command handler
//!
//! Local reset forgets this machine's tracking data; remote wipe destroys the
//! shared repository contents. Both ask for confirmation unless `--yes` is
//! given.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::logger::log_to_file;
use crate::scm::GitTransport;
use crate::settings::Settings;
use crate::sync;

use super::confirm;

/// Handle reset command
pub fn handle_reset(local: bool, remote_wipe: bool, assume_yes: bool) -> Result<()> {
    let mut settings = Settings::load().context("Failed to load settings")?;

    match (local, remote_wipe) {
        (true, false) => {
            println!("{}", "Local reset".cyan().bold());
            println!(
                "  Removes {} and every tracked entry. The remote is unchanged.",
                settings.repo_path.display()
            );
            if !confirm(
                "Reset local tracking data?",
                "Your dotfiles themselves are not touched",
                assume_yes,
            )? {
                println!("\n{}", "Reset cancelled.".yellow());
                return Ok(());
            }

            sync::local_reset(&mut settings)?;
            settings.save().context("Failed to save settings")?;
            log_to_file("reset: local")?;
            println!("\n{}", "Local reset complete".green().bold());
        }
        (false, true) => {
            println!("{}", "Full remote wipe".red().bold());
            println!(
                "  Destroys all content and history in {}.",
                settings.repo_url.bold()
            );
            if !confirm(
                "Permanently wipe the remote repository?",
                "This cannot be undone",
                assume_yes,
            )? {
                println!("\n{}", "Wipe cancelled.".yellow());
                return Ok(());
            }

            sync::remote_wipe(&mut settings, &GitTransport::new())?;
            settings.save().context("Failed to save settings")?;
            log_to_file(&format!("reset: remote wipe of {}", settings.repo_url))?;
            println!("\n{}", "Remote repository wiped".green().bold());
        }
        _ => bail!("Choose exactly one of --local or --remote-wipe"),
    }

    Ok(())
}
