use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::paths::{contract_home, expand_home};

/// A user-registered file or directory kept in sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    /// Home-relative path, `~`-prefixed (e.g. `~/.config/nvim`)
    pub path: String,

    /// Display name shown in listings
    #[serde(rename = "name")]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form labels for grouping entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(rename = "is_dir", default)]
    pub is_directory: bool,

    /// Stored per device profile instead of under `shared/`
    #[serde(rename = "profile_specific", default)]
    pub is_profile_specific: bool,

    /// Last manifest version this machine backed up or restored (0 = never)
    #[serde(default)]
    pub local_version: u64,

    /// Content hash as of the last successful backup or restore on this machine
    #[serde(rename = "last_hash", default, skip_serializing_if = "String::is_empty")]
    pub last_known_hash: String,
}

impl TrackedEntry {
    pub fn new(path: impl Into<String>, is_directory: bool) -> Self {
        let path = path.into();
        TrackedEntry {
            display_name: friendly_name(&path),
            path,
            description: None,
            tags: Vec::new(),
            is_directory,
            is_profile_specific: false,
            local_version: 0,
            last_known_hash: String::new(),
        }
    }

    /// Build an entry from a user-supplied path, normalizing it to `~/` form
    /// and detecting whether it is a directory.
    pub fn from_path(raw: &str, home: &Path) -> Result<Self> {
        let expanded = expand_home(raw, home);
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()
                .context("Failed to resolve current directory")?
                .join(expanded)
        };
        let metadata = fs::metadata(&absolute)
            .with_context(|| format!("Path does not exist: {}", absolute.display()))?;

        Ok(Self::new(contract_home(&absolute, home), metadata.is_dir()))
    }

    /// Display name, falling back to the path when none was recorded
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.path
        } else {
            &self.display_name
        }
    }

    pub fn with_profile_specific(mut self, profile_specific: bool) -> Self {
        self.is_profile_specific = profile_specific;
        self
    }
}

/// Friendly names for common `~/.config` applications
const KNOWN_APPS: &[(&str, &str)] = &[
    ("kitty", "Kitty Terminal"),
    ("wezterm", "WezTerm Terminal"),
    ("alacritty", "Alacritty Terminal"),
    ("ghostty", "Ghostty Terminal"),
    ("nvim", "Neovim"),
    ("helix", "Helix Editor"),
    ("fish", "Fish Shell"),
    ("zsh", "Zsh Shell"),
    ("starship", "Starship Prompt"),
    ("tmux", "Tmux Multiplexer"),
    ("lazygit", "LazyGit"),
    ("bat", "Bat (cat replacement)"),
    ("btop", "Btop System Monitor"),
    ("htop", "Htop Process Viewer"),
    ("karabiner", "Karabiner-Elements"),
    ("yabai", "Yabai Window Manager"),
    ("skhd", "skhd Hotkey Daemon"),
    ("aerospace", "AeroSpace Window Manager"),
    ("borders", "JankyBorders"),
    ("raycast", "Raycast"),
];

/// Human-readable name for a tracked path.
///
/// `~/.config/<app>` uses the known-app table, dotfiles lose their leading dot.
pub fn friendly_name(path: &str) -> String {
    let p = Path::new(path);
    let base = p
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());

    let in_config_dir = p
        .parent()
        .and_then(|parent| parent.file_name())
        .is_some_and(|name| name == ".config");

    if in_config_dir {
        if let Some((_, name)) = KNOWN_APPS.iter().find(|(dir, _)| *dir == base) {
            return name.to_string();
        }
        return capitalize(&base);
    }

    capitalize(base.trim_start_matches('.'))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Non-hidden subdirectories of `~/.config`, sorted, for bulk adding
pub fn list_config_dirs(home: &Path) -> Result<Vec<String>> {
    let config_dir = home.join(".config");
    let read_dir = fs::read_dir(&config_dir)
        .with_context(|| format!("Failed to read {}", config_dir.display()))?;

    let mut dirs: Vec<String> = read_dir
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    dirs.sort();

    Ok(dirs)
}

/// Split comma-separated tag input, trimming each tag and dropping blanks
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical form of a device profile name: trimmed and lowercased.
/// Returns `None` for blank input.
pub fn normalize_profile(profile: &str) -> Option<String> {
    let trimmed = profile.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
