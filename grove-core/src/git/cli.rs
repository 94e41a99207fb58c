//! `Vcs` implementation backed by the git command line and libgit2
//!
//! History queries and trial merges go through libgit2; anything that
//! touches the working checkout or the remote shells out to `git` under a
//! timeout, and only once the checkout is known to be clean.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, warn};

use super::repo::GitRepo;
use super::vcs::{ChangeKind, FileChange, MergeOutcome, Vcs};
use crate::{Error, Result};

/// Git adapter operating on one working checkout and one remote
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    remote: String,
    timeout: Duration,
}

impl GitCli {
    /// Create an adapter for the checkout at `root`
    pub fn new(root: impl Into<PathBuf>, remote: impl Into<String>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            remote: remote.into(),
            timeout,
        }
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn remote_ref(&self, branch: &str) -> String {
        format!("{}/{}", self.remote, branch)
    }

    fn repo(&self) -> Result<GitRepo> {
        GitRepo::open(&self.root)
    }

    /// Run git, killing it if it outlives the timeout
    async fn run(&self, args: &[&str]) -> Result<Output> {
        let command = args.first().copied().unwrap_or_default().to_string();
        debug!(args = ?args, "git");

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => {
                output.map_err(|e| Error::Git(format!("Failed to run git {}: {}", command, e)))
            }
            Err(_) => Err(Error::Timeout {
                command,
                timeout: self.timeout,
            }),
        }
    }

    /// Run git and return stdout, failing on a non-zero exit
    async fn run_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Refuse to switch branches over uncommitted work
    fn ensure_clean(&self) -> Result<()> {
        if self.repo()?.has_uncommitted_changes()? {
            warn!(root = %self.root.display(), "Working checkout has uncommitted changes");
            return Err(Error::DirtyCheckout(self.root.clone()));
        }
        Ok(())
    }
}

/// Classify a finished `git merge` invocation
fn merge_outcome(output: &Output, args: &[&str]) -> Result<MergeOutcome> {
    if output.status.success() {
        return Ok(MergeOutcome::Clean);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stdout.contains("CONFLICT") || stdout.contains("Automatic merge failed") {
        return Ok(MergeOutcome::Conflicted {
            detail: stdout
                .lines()
                .filter(|l| l.starts_with("CONFLICT"))
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    Err(Error::Git(format!(
        "git {} failed: {}",
        args.join(" "),
        stderr.trim()
    )))
}

/// Parse `git diff --name-status` output
fn parse_name_status(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let status = fields.next()?;
            // renames list old and new path; keep the new one
            let path = fields.last()?;
            Some(FileChange::new(path, ChangeKind::from_status(status)))
        })
        .collect()
}

/// Extract added lines from a unified diff
fn parse_added_lines(diff: &str) -> Vec<String> {
    diff.lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .map(|l| l[1..].to_string())
        .collect()
}

#[async_trait]
impl Vcs for GitCli {
    async fn fetch(&self) -> Result<()> {
        self.run_ok(&["fetch", "--prune", "--quiet", self.remote.as_str()])
            .await
            .map(|_| ())
    }

    async fn list_branches(&self, prefix: &str) -> Result<Vec<String>> {
        self.repo()?.list_remote_branches(self.remote.as_str(), prefix)
    }

    async fn commit_count(&self, from: &str, to: &str) -> Result<u32> {
        self.repo()?
            .count_commits(&self.remote_ref(from), &self.remote_ref(to))
    }

    async fn file_changes(&self, base: &str, head: &str) -> Result<Vec<FileChange>> {
        let range = format!("{}...{}", self.remote_ref(base), self.remote_ref(head));
        let output = self
            .run_ok(&["diff", "--name-status", "-M", range.as_str()])
            .await?;
        Ok(parse_name_status(&output))
    }

    async fn added_lines(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let range = format!("{}...{}", self.remote_ref(base), self.remote_ref(head));
        let output = self
            .run_ok(&["diff", "--unified=0", "--no-color", range.as_str()])
            .await?;
        Ok(parse_added_lines(&output))
    }

    async fn commit_messages(&self, base: &str, head: &str) -> Result<Vec<String>> {
        self.repo()?
            .commit_messages(&self.remote_ref(base), &self.remote_ref(head))
    }

    async fn last_commit_time(&self, branch: &str) -> Result<DateTime<Utc>> {
        self.repo()?.tip_time(&self.remote_ref(branch))
    }

    async fn trial_merge(&self, target: &str, source: &str) -> Result<MergeOutcome> {
        self.repo()?
            .trial_merge(&self.remote_ref(target), &self.remote_ref(source))
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.ensure_clean()?;
        self.run_ok(&["checkout", "--quiet", branch]).await.map(|_| ())
    }

    async fn pull(&self, branch: &str) -> Result<()> {
        self.run_ok(&["pull", "--ff-only", "--quiet", self.remote.as_str(), branch])
            .await
            .map(|_| ())
    }

    async fn create_branch(&self, name: &str, start: &str) -> Result<()> {
        self.ensure_clean()?;
        let start_ref = self.remote_ref(start);
        self.run_ok(&["checkout", "--quiet", "-B", name, start_ref.as_str()])
            .await
            .map(|_| ())
    }

    async fn merge(&self, source: &str, message: &str) -> Result<MergeOutcome> {
        let source_ref = self.remote_ref(source);
        let args = ["merge", "--no-ff", "-m", message, source_ref.as_str()];
        let output = self.run(&args).await?;
        merge_outcome(&output, &args)
    }

    async fn abort_merge(&self) -> Result<()> {
        let output = self.run(&["merge", "--abort"]).await?;
        if !output.status.success() {
            // nothing in progress; make sure the tree is clean anyway
            self.run_ok(&["reset", "--hard", "--quiet"]).await?;
        }
        Ok(())
    }

    async fn push(&self, local: &str, remote_branch: &str, force: bool) -> Result<()> {
        let refspec = format!("{}:refs/heads/{}", local, remote_branch);
        let mut args = vec!["push", "--quiet"];
        if force {
            args.push("--force");
        }
        args.push(self.remote.as_str());
        args.push(refspec.as_str());
        self.run_ok(&args).await.map(|_| ())
    }

    async fn delete_remote_branch(&self, branch: &str) -> Result<()> {
        let output = self
            .run(&["push", "--quiet", self.remote.as_str(), "--delete", branch])
            .await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("remote ref does not exist") {
            debug!(branch, "Remote branch already deleted");
            return Ok(());
        }

        Err(Error::Git(format!(
            "Failed to delete remote branch {}: {}",
            branch,
            stderr.trim()
        )))
    }

    async fn delete_local_branch(&self, name: &str) -> Result<()> {
        self.run_ok(&["branch", "--quiet", "-D", name])
            .await
            .map(|_| ())
    }
}
