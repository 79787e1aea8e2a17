//! Recursive copy used by both backup and restore.
//!
//! Symlinks are recreated, never followed. Special files and per-file I/O
//! errors are skipped and counted; only problems with the entry root itself
//! are returned as errors.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::hash::VCS_DIR;

/// Suffix of the sibling a new copy is built in before it replaces the old one
const STAGING_SUFFIX: &str = ".dotsync-tmp";

/// Per-entry copy accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    /// Regular files and symlinks written
    pub copied: usize,
    pub skipped: usize,
    /// `relative/path: reason` for every skipped file
    pub skip_reasons: Vec<String>,
    pub bytes_copied: u64,
    pub bytes_total: u64,
}

impl CopyStats {
    fn skip(&mut self, rel: &str, reason: impl AsRef<str>) {
        self.skipped += 1;
        self.skip_reasons.push(format!("{}: {}", rel, reason.as_ref()));
    }
}

/// Copy `src` (file, directory or symlink) to `dst`, creating parents.
pub fn copy_entry(src: &Path, dst: &Path, stats: &mut CopyStats) -> Result<()> {
    let metadata = fs::symlink_metadata(src)
        .with_context(|| format!("Source does not exist: {}", src.display()))?;
    let file_type = metadata.file_type();

    if file_type.is_dir() {
        copy_dir(src, dst, stats)
    } else if file_type.is_symlink() {
        if is_real_dir(dst) {
            stats.skip(&dst.display().to_string(), "destination is a directory");
            return Ok(());
        }
        ensure_parent(dst)?;
        copy_symlink(src, dst)
            .with_context(|| format!("Failed to recreate symlink {}", dst.display()))?;
        stats.copied += 1;
        Ok(())
    } else if file_type.is_file() {
        stats.bytes_total = metadata.len();
        ensure_parent(dst)?;
        replace_symlink(dst);
        let n = fs::copy(src, dst).with_context(|| {
            format!("Failed to copy {} to {}", src.display(), dst.display())
        })?;
        stats.bytes_copied = n;
        stats.copied += 1;
        Ok(())
    } else {
        Err(anyhow!(
            "{} is a special file (socket/pipe/device)",
            src.display()
        ))
    }
}

/// Copy `src` to `dst`, replacing what was at `dst` only once the copy worked.
///
/// The copy is built in a sibling staging path and renamed into place, so a
/// failed copy leaves the previous content of `dst` untouched.
pub fn replace_with_copy(src: &Path, dst: &Path, stats: &mut CopyStats) -> Result<()> {
    let staging = staging_path(dst);
    clear_destination(&staging)?;

    if let Err(err) = copy_entry(src, &staging, stats) {
        if let Err(cleanup) = clear_destination(&staging) {
            log::warn!("Could not remove staging copy: {:#}", cleanup);
        }
        return Err(err);
    }

    clear_destination(dst)?;
    fs::rename(&staging, dst).with_context(|| {
        format!("Failed to move {} into place at {}", staging.display(), dst.display())
    })
}

fn staging_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(STAGING_SUFFIX);
    dst.with_file_name(name)
}

/// Remove whatever is at `path`, if anything
pub fn clear_destination(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.with_context(|| format!("Failed to remove {}", path.display()))
}

fn copy_dir(src: &Path, dst: &Path, stats: &mut CopyStats) -> Result<()> {
    stats.bytes_total = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(not_vcs_dir)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum();

    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create {}", dst.display()))?;

    for item in WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(not_vcs_dir)
    {
        let item = match item {
            Ok(item) => item,
            Err(err) => {
                let rel = err
                    .path()
                    .and_then(|p| p.strip_prefix(src).ok())
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "?".to_string());
                stats.skip(&rel, format!("access error: {}", err));
                continue;
            }
        };

        let rel_path = match item.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(err) => {
                stats.skip(&item.path().display().to_string(), format!("path error: {}", err));
                continue;
            }
        };
        let rel = rel_path.display().to_string();
        let target = dst.join(rel_path);
        let file_type = item.file_type();

        if file_type.is_dir() {
            if let Err(err) = fs::create_dir_all(&target) {
                stats.skip(&rel, format!("mkdir error: {}", err));
            }
        } else if file_type.is_symlink() {
            if is_real_dir(&target) {
                stats.skip(&rel, "destination is a directory");
                continue;
            }
            match ensure_parent(&target).and_then(|_| Ok(copy_symlink(item.path(), &target)?)) {
                Ok(()) => stats.copied += 1,
                Err(err) => stats.skip(&rel, format!("symlink error: {:#}", err)),
            }
        } else if file_type.is_file() {
            if let Err(err) = ensure_parent(&target) {
                stats.skip(&rel, format!("mkdir error: {:#}", err));
                continue;
            }
            replace_symlink(&target);
            match fs::copy(item.path(), &target) {
                Ok(n) => {
                    stats.bytes_copied += n;
                    stats.copied += 1;
                }
                Err(err) => stats.skip(&rel, format!("copy error: {}", err)),
            }
        } else {
            stats.skip(&rel, "special file (socket/pipe/device)");
        }
    }

    Ok(())
}

fn not_vcs_dir(e: &walkdir::DirEntry) -> bool {
    !(e.depth() > 0 && e.file_type().is_dir() && e.file_name() == VCS_DIR)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// `fs::copy` writes through symlinks, so drop one sitting at the destination
fn replace_symlink(path: &Path) {
    if fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) {
        let _ = fs::remove_file(path);
    }
}

/// A directory that is not itself a symlink; never replaced by a symlink
fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let target = fs::read_link(src)?;
    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("symlinks are not supported on this platform: {}", src.display()),
    ))
}

/// Explain why a directory produced nothing to copy
pub fn describe_skipped_dir(dir: &Path) -> String {
    let (mut symlinks, mut sockets, mut other) = (0, 0, 0);

    for item in WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let ft = item.file_type();
        if ft.is_dir() || ft.is_file() {
            continue;
        }
        if ft.is_symlink() {
            symlinks += 1;
        } else if is_socket(&ft) {
            sockets += 1;
        } else {
            other += 1;
        }
    }

    let mut parts = Vec::new();
    if symlinks > 0 {
        parts.push(format!("{} symlink(s)", symlinks));
    }
    if sockets > 0 {
        parts.push(format!("{} socket(s)", sockets));
    }
    if other > 0 {
        parts.push(format!("{} special file(s)", other));
    }

    if parts.is_empty() {
        "no regular files found".to_string()
    } else {
        format!("only contains {}, nothing to back up", parts.join(", "))
    }
}

#[cfg(unix)]
fn is_socket(ft: &fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    ft.is_socket()
}

#[cfg(not(unix))]
fn is_socket(_ft: &fs::FileType) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_single_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join(".zshrc");
        fs::write(&src, "export EDITOR=nvim").unwrap();
        let dst = temp.path().join("repo/shared/.zshrc");

        let mut stats = CopyStats::default();
        copy_entry(&src, &dst, &mut stats).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "export EDITOR=nvim");
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.bytes_copied, 18);
        assert_eq!(stats.bytes_total, 18);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut stats = CopyStats::default();
        let dst = temp.path().join("dst");
        assert!(copy_entry(&temp.path().join("nope"), &dst, &mut stats).is_err());
    }

    #[test]
    fn test_copy_dir_skips_vcs_metadata() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("nvim");
        fs::create_dir_all(src.join("lua")).unwrap();
        fs::create_dir_all(src.join(".git/objects")).unwrap();
        fs::write(src.join("init.lua"), "x").unwrap();
        fs::write(src.join("lua/opts.lua"), "y").unwrap();
        fs::write(src.join(".git/HEAD"), "ref").unwrap();

        let dst = temp.path().join("out");
        let mut stats = CopyStats::default();
        copy_entry(&src, &dst, &mut stats).unwrap();

        assert!(dst.join("init.lua").exists());
        assert!(dst.join("lua/opts.lua").exists());
        assert!(!dst.join(".git").exists());
        assert_eq!(stats.copied, 2);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_are_recreated() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("cfg");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("real.conf"), "a=1").unwrap();
        std::os::unix::fs::symlink("real.conf", src.join("alias.conf")).unwrap();

        let dst = temp.path().join("out");
        let mut stats = CopyStats::default();
        copy_entry(&src, &dst, &mut stats).unwrap();

        let meta = fs::symlink_metadata(dst.join("alias.conf")).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(dst.join("alias.conf")).unwrap(), Path::new("real.conf"));
        assert_eq!(stats.copied, 2);
    }

    #[test]
    #[cfg(unix)]
    fn test_socket_only_dir_is_described() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("run");
        fs::create_dir_all(&src).unwrap();
        let _listener = std::os::unix::net::UnixListener::bind(src.join("agent.sock")).unwrap();

        let mut stats = CopyStats::default();
        copy_entry(&src, &temp.path().join("out"), &mut stats).unwrap();

        assert_eq!(stats.copied, 0);
        assert_eq!(stats.skipped, 1);
        assert!(stats.skip_reasons[0].starts_with("agent.sock: special file"));
        assert_eq!(
            describe_skipped_dir(&src),
            "only contains 1 socket(s), nothing to back up"
        );
    }

    #[test]
    fn test_clear_destination() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("d");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/f"), "x").unwrap();

        clear_destination(&dir).unwrap();
        assert!(!dir.exists());
        clear_destination(&dir).unwrap();
    }

    #[test]
    fn test_replace_with_copy_swaps_in_new_content() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("nvim");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("init.lua"), "new").unwrap();

        let dst = temp.path().join("repo/shared/nvim");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("stale.lua"), "old").unwrap();

        let mut stats = CopyStats::default();
        replace_with_copy(&src, &dst, &mut stats).unwrap();

        assert_eq!(fs::read_to_string(dst.join("init.lua")).unwrap(), "new");
        assert!(!dst.join("stale.lua").exists());
        assert!(!staging_path(&dst).exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_copy_keeps_previous_content() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join(".a");
        let _listener = std::os::unix::net::UnixListener::bind(&src).unwrap();

        let dst = temp.path().join("repo/shared/.a");
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::write(&dst, "backed up earlier").unwrap();

        let mut stats = CopyStats::default();
        assert!(replace_with_copy(&src, &dst, &mut stats).is_err());

        assert_eq!(fs::read_to_string(&dst).unwrap(), "backed up earlier");
        assert!(fs::symlink_metadata(staging_path(&dst)).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_never_replaces_real_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("repo/app");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("config.toml"), "theme = 'mine'").unwrap();
        std::os::unix::fs::symlink("/elsewhere/themes", src.join("themes")).unwrap();

        let dst = temp.path().join("home/app");
        fs::create_dir_all(dst.join("themes")).unwrap();
        fs::write(dst.join("themes/mine.toml"), "bg = 'black'").unwrap();

        let mut stats = CopyStats::default();
        copy_entry(&src, &dst, &mut stats).unwrap();

        assert_eq!(fs::read_to_string(dst.join("themes/mine.toml")).unwrap(), "bg = 'black'");
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.skip_reasons[0], "themes: destination is a directory");
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_entry_over_real_directory_is_skipped() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("link");
        std::os::unix::fs::symlink("/elsewhere", &src).unwrap();
        let dst = temp.path().join("themes");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("mine.toml"), "x").unwrap();

        let mut stats = CopyStats::default();
        copy_entry(&src, &dst, &mut stats).unwrap();

        assert!(dst.join("mine.toml").exists());
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.copied, 0);
    }
}
