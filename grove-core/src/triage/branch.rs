//! Candidate branches and their per-run evaluation

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::decision::Decision;
use super::issues::ResolvedIssueRef;
use super::readiness::ReadinessReport;
use super::vision::VisionScore;
use crate::git::FileChange;

/// A candidate branch measured against the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    /// Branch name without the remote component
    pub name: String,
    /// Commits on the branch that the target lacks
    pub commits_ahead: u32,
    /// Commits on the target that the branch lacks
    pub commits_behind: u32,
    /// Commit time of the branch tip
    pub last_activity: DateTime<Utc>,
    /// Changes relative to the merge base with the target
    pub changes: Vec<FileChange>,
    /// Paths of `changes`
    pub changed_files: BTreeSet<String>,
}

impl Branch {
    /// Build a branch from its measured metrics
    pub fn new(
        name: impl Into<String>,
        commits_ahead: u32,
        commits_behind: u32,
        last_activity: DateTime<Utc>,
        changes: Vec<FileChange>,
    ) -> Self {
        let changed_files = changes.iter().map(|c| c.path.clone()).collect();
        Self {
            name: name.into(),
            commits_ahead,
            commits_behind,
            last_activity,
            changes,
            changed_files,
        }
    }

    /// Paths changed on both branches
    pub fn shared_files<'a>(&'a self, other: &'a Branch) -> impl Iterator<Item = &'a String> {
        self.changed_files.intersection(&other.changed_files)
    }

    /// Fold another branch's metrics into this one
    ///
    /// Used when the real metrics cannot be re-read after a consolidation.
    pub fn absorb(&mut self, other: &Branch) {
        self.commits_ahead += other.commits_ahead;
        self.last_activity = self.last_activity.max(other.last_activity);
        for change in &other.changes {
            if self.changed_files.insert(change.path.clone()) {
                self.changes.push(change.clone());
            }
        }
    }
}

/// Everything computed about one branch before acting on it
#[derive(Debug, Clone, Serialize)]
pub struct BranchEvaluation {
    /// The branch as measured
    pub branch: Branch,
    /// Structural health
    pub readiness: ReadinessReport,
    /// Issue references found on the branch
    pub issue_refs: Vec<ResolvedIssueRef>,
    /// Domain alignment
    pub vision: VisionScore,
    /// What to do with the branch
    pub decision: Decision,
}

impl BranchEvaluation {
    /// Verified issue numbers this branch resolves
    pub fn verified_issues(&self) -> Vec<u64> {
        self.issue_refs
            .iter()
            .filter(|r| r.is_verified())
            .map(|r| r.number)
            .collect()
    }

    /// Issue numbers mentioned on the branch that the tracker did not confirm
    pub fn unverified_issues(&self) -> Vec<u64> {
        self.issue_refs
            .iter()
            .filter(|r| !r.is_verified())
            .map(|r| r.number)
            .collect()
    }
}
