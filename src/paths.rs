use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Get the current user's home directory
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Failed to get home directory")
}

/// Expand a leading `~` or `~/` against `home`.
///
/// Paths without a tilde prefix are returned unchanged.
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Turn an absolute path under `home` back into its `~/` form.
pub fn contract_home(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rel) if rel.as_os_str().is_empty() => "~".to_string(),
        Ok(rel) => format!("~/{}", to_slash(rel)),
        Err(_) => path.to_string_lossy().to_string(),
    }
}

/// Path of an entry relative to the home directory, slash-separated.
///
/// Paths outside the home directory fall back to their final component so they
/// still land somewhere inside the repository.
pub fn home_relative(path: &str, home: &Path) -> String {
    let expanded = expand_home(path, home);
    match expanded.strip_prefix(home) {
        Ok(rel) if !rel.as_os_str().is_empty() => to_slash(rel),
        _ => {
            let base = expanded
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "unnamed".to_string());
            log::debug!("{} is outside the home directory, using '{}'", path, base);
            base
        }
    }
}

/// Join the normal components of a relative path with `/`.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
