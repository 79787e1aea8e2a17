//! Transport that moves the local repository clone to and from the remote.
//!
//! Workflows only talk to [`SyncTransport`]; the git CLI backend lives in
//! [`GitTransport`]. Tests substitute a recording implementation.

mod git;

use anyhow::Result;
use std::path::Path;

pub use git::GitTransport;

/// README written to a freshly seeded or wiped repository
pub const README_CONTENTS: &str = "# dotfiles\n\nManaged by dotsync.\n\n\
`shared/` holds entries common to every device, `profiles/<name>/` holds\n\
device-specific entries. `.dotsync-manifest.yaml` records versions.\n";

/// Operations a sync workflow needs from the remote repository.
pub trait SyncTransport: Send + Sync {
    /// Make `local_path` an up-to-date clone of `remote_url`.
    ///
    /// Clones when there is no clone yet, re-clones when the clone points at a
    /// different remote, and fast-forwards otherwise.
    fn ensure_local_copy(&self, remote_url: &str, local_path: &Path) -> Result<()>;

    /// Stage everything, commit, and push whatever the remote is missing.
    ///
    /// Commits left behind by an earlier failed push go out too. Returns
    /// `false` when the tree is clean and nothing is waiting to be pushed.
    fn commit_and_push(&self, local_path: &Path, message: &str) -> Result<bool>;

    /// True when the clone has uncommitted changes or commits the remote
    /// has not received.
    fn has_unpushed(&self, local_path: &Path) -> Result<bool>;

    /// Replace the remote contents with a lone README, force-pushed.
    fn wipe_remote(&self, local_path: &Path) -> Result<()>;
}

/// Check if a directory is a git working tree.
pub fn is_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_repo() {
        let temp = TempDir::new().unwrap();
        assert!(!is_repo(temp.path()));

        std::fs::create_dir(temp.path().join(".git")).unwrap();
        assert!(is_repo(temp.path()));
    }
}
