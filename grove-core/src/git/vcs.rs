//! Version-control capability used by the triage engine
//!
//! Branch arguments are short names (`claude/foo`, `main`); implementations
//! qualify them with the remote where a remote-tracking ref is meant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;

/// How a file changed between two revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Parse the status letter of `git diff --name-status`
    pub fn from_status(status: &str) -> Self {
        match status.chars().next() {
            Some('A') => ChangeKind::Added,
            Some('D') => ChangeKind::Deleted,
            Some('R') => ChangeKind::Renamed,
            _ => ChangeKind::Modified,
        }
    }
}

/// A changed path together with its kind of change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    /// Path relative to the repository root (new path for renames)
    pub path: String,
    /// Kind of change
    pub kind: ChangeKind,
}

impl FileChange {
    /// Shorthand constructor
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Result of a merge attempt that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge applied without conflicts
    Clean,
    /// The merge stopped on conflicts
    Conflicted {
        /// Output describing the conflict
        detail: String,
    },
}

impl MergeOutcome {
    /// Check if the merge applied cleanly
    pub fn is_clean(&self) -> bool {
        matches!(self, MergeOutcome::Clean)
    }
}

/// Operations the triage engine needs from version control
///
/// Every mutating method leaves the working checkout usable on error; the
/// engine adds the abort/rollback sequence on top.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Refresh remote-tracking refs
    async fn fetch(&self) -> Result<()>;

    /// Branches on the remote whose names start with `prefix`, sorted
    async fn list_branches(&self, prefix: &str) -> Result<Vec<String>>;

    /// Commits reachable from `to` but not from `from` (`from..to`)
    async fn commit_count(&self, from: &str, to: &str) -> Result<u32>;

    /// Files changed on `head` since its merge base with `base` (`base...head`)
    async fn file_changes(&self, base: &str, head: &str) -> Result<Vec<FileChange>>;

    /// Lines added on `head` since its merge base with `base`, without the `+`
    async fn added_lines(&self, base: &str, head: &str) -> Result<Vec<String>>;

    /// Messages of the commits in `base..head`
    async fn commit_messages(&self, base: &str, head: &str) -> Result<Vec<String>>;

    /// Commit time of the branch tip
    async fn last_commit_time(&self, branch: &str) -> Result<DateTime<Utc>>;

    /// Whether `source` would merge into `target` without conflicts
    ///
    /// Must leave the working checkout, the index and every ref exactly as
    /// they were, whatever the result.
    async fn trial_merge(&self, target: &str, source: &str) -> Result<MergeOutcome>;

    /// Check out a local branch, creating it from the remote if needed
    ///
    /// Fails with a fatal error when the checkout has uncommitted changes.
    async fn checkout(&self, branch: &str) -> Result<()>;

    /// Fast-forward the checked-out branch from the remote
    async fn pull(&self, branch: &str) -> Result<()>;

    /// Create (or reset) local branch `name` at the remote's `start` and check it out
    async fn create_branch(&self, name: &str, start: &str) -> Result<()>;

    /// Non-fast-forward merge of the remote `source` into the checked-out branch
    async fn merge(&self, source: &str, message: &str) -> Result<MergeOutcome>;

    /// Abort an in-progress merge and restore the checkout
    async fn abort_merge(&self) -> Result<()>;

    /// Push local branch `local` to `remote_branch` on the remote
    async fn push(&self, local: &str, remote_branch: &str, force: bool) -> Result<()>;

    /// Delete a branch on the remote; succeeds if it is already gone
    async fn delete_remote_branch(&self, branch: &str) -> Result<()>;

    /// Delete a local branch
    async fn delete_local_branch(&self, name: &str) -> Result<()>;
}
