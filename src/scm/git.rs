//! Git transport using CLI commands.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

use super::{is_repo, SyncTransport, README_CONTENTS};
use crate::hash::VCS_DIR;

/// Temporary branch the wiped history is rebuilt on
const WIPE_BRANCH: &str = "dotsync-wipe";

/// [`SyncTransport`] backed by the `git` executable.
///
/// Authentication and the commit identity come from the user's own git setup
/// unless an explicit identity is configured.
#[derive(Debug, Clone, Default)]
pub struct GitTransport {
    identity: Option<(String, String)>,
}

impl GitTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit as `name <email>` instead of the configured git user
    pub fn with_identity(name: impl Into<String>, email: impl Into<String>) -> Self {
        GitTransport {
            identity: Some((name.into(), email.into())),
        }
    }

    /// Check if a `git` executable can be run.
    pub fn is_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new("git");
        if let Some((name, email)) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={}", name))
                .arg("-c")
                .arg(format!("user.email={}", email));
        }
        cmd.current_dir(dir);
        cmd
    }

    /// Run a git command in `dir` and return stdout as a string.
    fn run_git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = self
            .command(dir)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run 'git {}'", args.join(" ")))?;

        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Check if a git command succeeds (exit code 0).
    fn git_succeeds(&self, dir: &Path, args: &[&str]) -> bool {
        self.command(dir)
            .args(args)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn clone_into(&self, remote_url: &str, local_path: &Path) -> Result<()> {
        if fs::symlink_metadata(local_path).is_ok() {
            fs::remove_dir_all(local_path).with_context(|| {
                format!("Failed to remove stale clone at {}", local_path.display())
            })?;
        }
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let target = if local_path.is_absolute() {
            local_path.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to resolve current directory")?
                .join(local_path)
        };

        log::info!("Cloning {} into {}", remote_url, target.display());
        // Run from a directory that surely exists; the process cwd may be gone
        self.run_git(&std::env::temp_dir(), &["clone", remote_url, &target.to_string_lossy()])?;

        if !self.git_succeeds(local_path, &["rev-parse", "HEAD"]) {
            self.seed(local_path)?;
        }
        Ok(())
    }

    /// Give an empty remote its first commit
    fn seed(&self, local_path: &Path) -> Result<()> {
        log::info!("Remote is empty, seeding it with a README");
        fs::write(local_path.join("README.md"), README_CONTENTS)
            .context("Failed to write README.md")?;
        self.run_git(local_path, &["add", "-A"])?;
        self.run_git(local_path, &["commit", "-m", "Initial commit"])?;
        self.run_git(local_path, &["push", "-u", "origin", "HEAD"])
            .context("Failed to push the initial commit")?;
        Ok(())
    }

    /// Whether HEAD has commits its upstream branch lacks
    fn is_ahead(&self, local_path: &Path) -> bool {
        self.run_git(local_path, &["rev-list", "--count", "@{u}..HEAD"])
            .ok()
            .and_then(|n| n.parse::<u64>().ok())
            .is_some_and(|n| n > 0)
    }

    fn pull(&self, local_path: &Path) -> Result<()> {
        let remotes = self.run_git(local_path, &["remote"]).unwrap_or_default();
        if remotes.is_empty() {
            log::debug!("{} has no remote, skipping pull", local_path.display());
            return Ok(());
        }
        if !self.git_succeeds(local_path, &["rev-parse", "HEAD"]) {
            return Ok(());
        }
        if !self.git_succeeds(local_path, &["rev-parse", "--abbrev-ref", "@{u}"]) {
            log::debug!("No upstream branch configured, skipping pull");
            return Ok(());
        }
        self.run_git(local_path, &["pull", "--ff-only"])
            .context("Failed to fast-forward the local clone")?;
        Ok(())
    }
}

impl SyncTransport for GitTransport {
    fn ensure_local_copy(&self, remote_url: &str, local_path: &Path) -> Result<()> {
        if !is_repo(local_path) {
            return self.clone_into(remote_url, local_path);
        }

        let current = self
            .run_git(local_path, &["remote", "get-url", "origin"])
            .unwrap_or_default();
        if !current.is_empty() && current != remote_url {
            log::warn!(
                "Clone at {} points at {}, re-cloning from {}",
                local_path.display(),
                current,
                remote_url
            );
            return self.clone_into(remote_url, local_path);
        }

        self.pull(local_path)
    }

    fn commit_and_push(&self, local_path: &Path, message: &str) -> Result<bool> {
        self.run_git(local_path, &["add", "-A"])?;

        let status = self.run_git(local_path, &["status", "--porcelain"])?;
        if !status.is_empty() {
            self.run_git(local_path, &["commit", "-m", message])?;
        } else if self.is_ahead(local_path) {
            log::info!("Pushing commits left over from an earlier backup");
        } else {
            log::debug!("Nothing to commit in {}", local_path.display());
            return Ok(false);
        }

        self.run_git(local_path, &["push", "-u", "origin", "HEAD"])
            .context("Failed to push to the remote")?;
        log::info!("Pushed: {}", message);
        Ok(true)
    }

    fn has_unpushed(&self, local_path: &Path) -> Result<bool> {
        let status = self.run_git(local_path, &["status", "--porcelain"])?;
        Ok(!status.is_empty() || self.is_ahead(local_path))
    }

    fn wipe_remote(&self, local_path: &Path) -> Result<()> {
        for item in fs::read_dir(local_path)
            .with_context(|| format!("Failed to read {}", local_path.display()))?
        {
            let item = item?;
            if item.file_name() == VCS_DIR {
                continue;
            }
            let path = item.path();
            let removed = if item.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.with_context(|| format!("Failed to remove {}", path.display()))?;
        }

        fs::write(local_path.join("README.md"), README_CONTENTS)
            .context("Failed to write README.md")?;

        // A parentless commit replacing the branch drops all earlier history
        let branch = self.run_git(local_path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        self.run_git(local_path, &["checkout", "--orphan", WIPE_BRANCH])?;
        self.run_git(local_path, &["add", "-A"])?;
        self.run_git(local_path, &["commit", "-m", "Reset repository"])?;
        self.run_git(local_path, &["branch", "-M", &branch])?;
        self.run_git(local_path, &["push", "--force", "-u", "origin", &branch])
            .context("Failed to force-push the wiped repository")?;
        log::warn!("Remote repository wiped");
        Ok(())
    }
}
