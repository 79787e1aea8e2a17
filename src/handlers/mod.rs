//! Command handler modules
//!
//! Each subcommand of the CLI is handled here, grouped by area. Handlers
//! load the settings, call into the sync core and print the result.

pub mod entries;
pub mod reset;
pub mod sync;

pub use entries::{
    handle_add, handle_browse, handle_init, handle_list, handle_profile, handle_remove,
    handle_tag, handle_toggle_profile,
};
pub use reset::handle_reset;
pub use sync::{handle_backup, handle_restore, handle_status};

use anyhow::{Context, Result};
use inquire::Confirm;

use crate::paths::{contract_home, expand_home};

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Ask for a yes/no answer, defaulting to no.
///
/// Returns `true` immediately when `assume_yes` is set. Without a terminal
/// and without `assume_yes` the answer is no.
fn confirm(prompt: &str, help: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !is_interactive() {
        return Ok(false);
    }
    Confirm::new(prompt)
        .with_default(false)
        .with_help_message(help)
        .prompt()
        .context("Failed to get confirmation")
}

/// Normalize user-typed paths to the `~/` form entries are stored in
fn normalize_paths(paths: &[String], home: &std::path::Path) -> Vec<String> {
    paths
        .iter()
        .map(|p| contract_home(&expand_home(p, home), home))
        .collect()
}
