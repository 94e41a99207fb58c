//! In-memory version control and issue tracker for engine tests

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::git::{FileChange, MergeOutcome, Vcs};
use crate::tracker::{IssueTracker, TrackedIssue};
use crate::{Error, Result};

/// State of one branch in the fake remote
#[derive(Debug, Clone)]
pub(crate) struct FakeBranch {
    pub ahead: u32,
    pub behind: u32,
    pub last_activity: DateTime<Utc>,
    pub changes: Vec<FileChange>,
    pub added_lines: Vec<String>,
    pub messages: Vec<String>,
    pub conflicts: bool,
}

impl FakeBranch {
    pub fn new(ahead: u32, changes: Vec<FileChange>) -> Self {
        Self {
            ahead,
            behind: 0,
            last_activity: Utc::now(),
            changes,
            added_lines: Vec::new(),
            messages: Vec::new(),
            conflicts: false,
        }
    }

    pub fn behind(mut self, behind: u32) -> Self {
        self.behind = behind;
        self
    }

    pub fn last_activity(mut self, at: DateTime<Utc>) -> Self {
        self.last_activity = at;
        self
    }

    pub fn added_lines(mut self, lines: &[&str]) -> Self {
        self.added_lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn messages(mut self, messages: &[&str]) -> Self {
        self.messages = messages.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn conflicting(mut self) -> Self {
        self.conflicts = true;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    branches: BTreeMap<String, FakeBranch>,
    calls: Vec<String>,
    trial_merges: Vec<String>,
    failing: BTreeSet<String>,
    timeouts: BTreeSet<String>,
    list_error: Option<String>,
    pending_merge: Option<String>,
}

/// Fake remote keyed by branch name; the target branch is implicit
#[derive(Debug)]
pub(crate) struct FakeVcs {
    target: String,
    state: Mutex<FakeState>,
}

impl FakeVcs {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_branch(self, name: &str, branch: FakeBranch) -> Self {
        self.state
            .lock()
            .unwrap()
            .branches
            .insert(name.to_string(), branch);
        self
    }

    /// Make every call of `operation` fail
    pub fn failing(self, operation: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(operation.to_string());
        self
    }

    /// Make every call of `operation` hang past its timeout
    pub fn timing_out(self, operation: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .timeouts
            .insert(operation.to_string());
        self
    }

    pub fn failing_listing(self, reason: &str) -> Self {
        self.state.lock().unwrap().list_error = Some(reason.to_string());
        self
    }

    /// Mutating calls in order, formatted as `op arg...`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn trial_merges(&self) -> Vec<String> {
        self.state.lock().unwrap().trial_merges.clone()
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.state.lock().unwrap().branches.contains_key(name)
    }

    pub fn branch(&self, name: &str) -> Option<FakeBranch> {
        self.state.lock().unwrap().branches.get(name).cloned()
    }

    fn record(&self, operation: &str, args: &[&str]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut call = operation.to_string();
        for arg in args {
            call.push(' ');
            call.push_str(arg);
        }
        state.calls.push(call);
        if state.timeouts.contains(operation) {
            return Err(Error::Timeout {
                command: operation.to_string(),
                timeout: Duration::from_secs(120),
            });
        }
        if state.failing.contains(operation) {
            return Err(Error::Git(format!("{} failed", operation)));
        }
        Ok(())
    }

    fn read(&self, name: &str) -> Result<FakeBranch> {
        self.branch(name)
            .ok_or_else(|| Error::Git(format!("unknown branch {}", name)))
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn fetch(&self) -> Result<()> {
        Ok(())
    }

    async fn list_branches(&self, prefix: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.list_error {
            return Err(Error::Git(reason.clone()));
        }
        Ok(state
            .branches
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn commit_count(&self, from: &str, to: &str) -> Result<u32> {
        if from == self.target {
            return Ok(self.read(to)?.ahead);
        }
        if to == self.target {
            return Ok(self.read(from)?.behind);
        }
        Ok(0)
    }

    async fn file_changes(&self, _base: &str, head: &str) -> Result<Vec<FileChange>> {
        Ok(self.read(head)?.changes)
    }

    async fn added_lines(&self, _base: &str, head: &str) -> Result<Vec<String>> {
        Ok(self.read(head)?.added_lines)
    }

    async fn commit_messages(&self, _base: &str, head: &str) -> Result<Vec<String>> {
        Ok(self.read(head)?.messages)
    }

    async fn last_commit_time(&self, branch: &str) -> Result<DateTime<Utc>> {
        Ok(self.read(branch)?.last_activity)
    }

    async fn trial_merge(&self, _target: &str, source: &str) -> Result<MergeOutcome> {
        let branch = self.read(source)?;
        self.state
            .lock()
            .unwrap()
            .trial_merges
            .push(source.to_string());
        if branch.conflicts {
            return Ok(MergeOutcome::Conflicted {
                detail: "CONFLICT (content)".to_string(),
            });
        }
        Ok(MergeOutcome::Clean)
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.record("checkout", &[branch])
    }

    async fn pull(&self, branch: &str) -> Result<()> {
        self.record("pull", &[branch])
    }

    async fn create_branch(&self, name: &str, start: &str) -> Result<()> {
        self.record("create_branch", &[name, start])
    }

    async fn merge(&self, source: &str, _message: &str) -> Result<MergeOutcome> {
        self.record("merge", &[source])?;
        let branch = self.read(source)?;
        if branch.conflicts {
            return Ok(MergeOutcome::Conflicted {
                detail: "CONFLICT (content)".to_string(),
            });
        }
        self.state.lock().unwrap().pending_merge = Some(source.to_string());
        Ok(MergeOutcome::Clean)
    }

    async fn abort_merge(&self) -> Result<()> {
        self.state.lock().unwrap().pending_merge = None;
        self.record("abort_merge", &[])
    }

    async fn push(&self, local: &str, remote_branch: &str, force: bool) -> Result<()> {
        let flag = if force { "--force" } else { "" };
        self.record("push", &[local, remote_branch, flag])?;

        let mut state = self.state.lock().unwrap();
        let Some(source) = state.pending_merge.take() else {
            return Ok(());
        };
        let Some(merged) = state.branches.get(&source).cloned() else {
            return Ok(());
        };
        if let Some(dest) = state.branches.get_mut(remote_branch) {
            dest.ahead += merged.ahead;
            for change in merged.changes {
                if !dest.changes.iter().any(|c| c.path == change.path) {
                    dest.changes.push(change);
                }
            }
        }
        Ok(())
    }

    async fn delete_remote_branch(&self, branch: &str) -> Result<()> {
        self.record("delete_remote_branch", &[branch])?;
        self.state.lock().unwrap().branches.remove(branch);
        Ok(())
    }

    async fn delete_local_branch(&self, name: &str) -> Result<()> {
        self.record("delete_local_branch", &[name])
    }
}

/// Fake tracker holding a fixed set of issues
#[derive(Debug, Default)]
pub(crate) struct FakeTracker {
    issues: BTreeMap<u64, TrackedIssue>,
    closed: Mutex<Vec<(u64, String)>>,
    fail_list: bool,
    fail_close: bool,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(mut self, number: u64, labels: &[&str], open: bool) -> Self {
        self.issues.insert(
            number,
            TrackedIssue {
                number,
                title: format!("Issue {}", number),
                labels: labels.iter().map(|l| l.to_string()).collect(),
                created_at: Utc::now(),
                open,
            },
        );
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn closed(&self) -> Vec<(u64, String)> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn list_open_issues(&self) -> Result<Vec<TrackedIssue>> {
        if self.fail_list {
            return Err(Error::Tracker("service unavailable".to_string()));
        }
        Ok(self.issues.values().filter(|i| i.open).cloned().collect())
    }

    async fn view_issue(&self, number: u64) -> Result<Option<TrackedIssue>> {
        Ok(self.issues.get(&number).cloned())
    }

    async fn close_issue(&self, number: u64, comment: &str) -> Result<()> {
        if self.fail_close {
            return Err(Error::Tracker(format!("cannot close #{}", number)));
        }
        self.closed
            .lock()
            .unwrap()
            .push((number, comment.to_string()));
        Ok(())
    }
}
