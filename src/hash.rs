//! Content fingerprints used for change detection.
//!
//! A digest depends only on bytes, relative paths and symlink targets. Timestamps,
//! permissions and directory enumeration order never affect it.

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use walkdir::WalkDir;

use crate::entry::TrackedEntry;
use crate::paths::{expand_home, to_slash};

/// Directory name excluded from hashing and copying
pub const VCS_DIR: &str = ".git";

/// Hex-encoded SHA-256 of a single file's bytes
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Deterministic digest of a directory tree.
///
/// Regular files are fed as `relative path` then contents, followed by every
/// symlink as `symlink:<relative path>` then its target, each group sorted by
/// path. Nested `.git` directories, special files and files that cannot be read
/// are left out. Only a failure to open the root itself is an error.
pub fn hash_dir(root: &Path) -> Result<String> {
    let mut files = Vec::new();
    let mut symlinks = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0 && e.file_type().is_dir() && e.file_name() == VCS_DIR)
        });

    for item in walker {
        let item = match item {
            Ok(item) => item,
            Err(err) if err.depth() == 0 => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to read {}", root.display())));
            }
            Err(err) => {
                log::debug!("Skipping unreadable path while hashing: {}", err);
                continue;
            }
        };

        let file_type = item.file_type();
        if file_type.is_dir() {
            continue;
        }

        let rel = match item.path().strip_prefix(root) {
            Ok(rel) => to_slash(rel),
            Err(_) => continue,
        };

        if file_type.is_symlink() {
            symlinks.push((rel, item.into_path()));
        } else if file_type.is_file() {
            files.push((rel, item.into_path()));
        }
    }

    files.sort();
    symlinks.sort();

    let mut hasher = Sha256::new();
    for (rel, path) in &files {
        let fed = File::open(path).and_then(|file| feed_file(&mut hasher, rel, file));
        if let Err(err) = fed {
            log::debug!("Skipping {} while hashing: {}", path.display(), err);
        }
    }
    for (rel, path) in &symlinks {
        let target = match fs::read_link(path) {
            Ok(t) => t,
            Err(err) => {
                log::debug!("Skipping symlink {} while hashing: {}", path.display(), err);
                continue;
            }
        };
        hasher.update(format!("symlink:{rel}").as_bytes());
        hasher.update(target.to_string_lossy().as_bytes());
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Feed `rel` and the full contents of `reader` into `hasher`.
///
/// Nothing is fed unless the whole file could be read.
fn feed_file(hasher: &mut Sha256, rel: &str, mut reader: impl Read) -> io::Result<()> {
    let mut contents = Vec::new();
    reader.read_to_end(&mut contents)?;
    hasher.update(rel.as_bytes());
    hasher.update(&contents);
    Ok(())
}

/// Hash whatever is at `path`: a file, a directory tree, or a symlink.
pub fn hash_path(path: &Path) -> Result<String> {
    let metadata = fs::symlink_metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let file_type = metadata.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(path)
            .with_context(|| format!("Failed to read symlink {}", path.display()))?;
        let mut hasher = Sha256::new();
        hasher.update(b"symlink:");
        hasher.update(target.to_string_lossy().as_bytes());
        Ok(hex::encode(hasher.finalize()))
    } else if file_type.is_dir() {
        hash_dir(path)
    } else if file_type.is_file() {
        hash_file(path)
    } else {
        Err(anyhow!("{} is not a regular file, directory or symlink", path.display()))
    }
}

/// Hash the local copy of a tracked entry
pub fn hash_entry(entry: &TrackedEntry, home: &Path) -> Result<String> {
    hash_path(&expand_home(&entry.path, home))
}
