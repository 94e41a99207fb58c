//! Merge executor
//!
//! Applies a decision to the repository. Merges are rolled back on failure;
//! issue closing happens only after the merged target is pushed and never
//! undoes it.

use serde::Serialize;
use tracing::{info, warn};

use super::branch::BranchEvaluation;
use super::decision::Action;
use crate::git::{MergeOutcome, Vcs};
use crate::tracker::IssueTracker;
use crate::Result;

/// Final state of a branch after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BranchOutcome {
    /// Merged into the target and deleted
    Merged,
    /// Deleted because it had nothing left to merge
    Cleaned,
    /// Left alone
    Skipped,
    /// An action was attempted and rolled back
    Failed { reason: String },
    /// Folded into another branch by consolidation
    Absorbed { into: String },
}

impl BranchOutcome {
    /// Whether the branch still exists on the remote after the run
    pub fn is_remaining(&self) -> bool {
        matches!(self, BranchOutcome::Skipped | BranchOutcome::Failed { .. })
    }
}

/// What executing one decision produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Outcome of the branch
    pub outcome: BranchOutcome,
    /// Verified issues closed (or that would be closed in dry-run)
    pub resolved_issues: Vec<u64>,
    /// Issues the tracker refused to close
    pub close_failures: Vec<u64>,
}

impl ExecutionReport {
    fn outcome(outcome: BranchOutcome) -> Self {
        Self {
            outcome,
            resolved_issues: Vec::new(),
            close_failures: Vec::new(),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::outcome(BranchOutcome::Failed {
            reason: reason.into(),
        })
    }
}

/// Build the `--no-ff` merge commit message
pub fn merge_message(target: &str, evaluation: &BranchEvaluation) -> String {
    let branch = &evaluation.branch;
    let decision = &evaluation.decision;

    let mut message = format!(
        "Merge branch '{}' into {}\n\n\
         Rationale: {}\n\
         Readiness: {}/9, Vision: {}/10, Total: {}\n\
         Commits ahead: {}, behind: {}, files changed: {}\n",
        branch.name,
        target,
        decision.justification,
        decision.scores.readiness,
        decision.scores.vision,
        decision.scores.total,
        branch.commits_ahead,
        branch.commits_behind,
        branch.changed_files.len(),
    );

    let resolved = evaluation.verified_issues();
    if !resolved.is_empty() {
        let ids: Vec<String> = resolved.iter().map(|n| format!("#{}", n)).collect();
        message.push_str(&format!("Resolves: {}\n", ids.join(", ")));
    }

    message
}

fn close_comment(target: &str, evaluation: &BranchEvaluation) -> String {
    format!(
        "Resolved by automatically merging `{}` into `{}`.\n\n\
         Readiness {}/9, vision {}/10. Decision: {}",
        evaluation.branch.name,
        target,
        evaluation.decision.scores.readiness,
        evaluation.decision.scores.vision,
        evaluation.decision.justification,
    )
}

/// Applies decisions against version control and the issue tracker
pub struct Executor<'a> {
    vcs: &'a dyn Vcs,
    tracker: Option<&'a dyn IssueTracker>,
    target: &'a str,
    dry_run: bool,
}

impl<'a> Executor<'a> {
    /// Create an executor for one target branch
    pub fn new(
        vcs: &'a dyn Vcs,
        tracker: Option<&'a dyn IssueTracker>,
        target: &'a str,
        dry_run: bool,
    ) -> Self {
        Self {
            vcs,
            tracker,
            target,
            dry_run,
        }
    }

    /// Carry out the decision attached to `evaluation`
    ///
    /// Only fatal errors are returned; everything else is a `Failed` outcome.
    pub async fn execute(&self, evaluation: &BranchEvaluation) -> Result<ExecutionReport> {
        let name = &evaluation.branch.name;
        let decision = &evaluation.decision;

        match decision.action {
            Action::Skip => {
                info!(branch = %name, reason = %decision.justification, "Skipping");
                Ok(ExecutionReport::outcome(BranchOutcome::Skipped))
            }
            Action::Cleanup if self.dry_run => {
                info!(branch = %name, "[dry-run] Would delete fully merged branch");
                Ok(ExecutionReport::outcome(BranchOutcome::Cleaned))
            }
            Action::Cleanup => self.cleanup(name).await,
            Action::Merge if self.dry_run => {
                let resolved = evaluation.verified_issues();
                info!(
                    branch = %name,
                    target = %self.target,
                    issues = ?resolved,
                    reason = %decision.justification,
                    "[dry-run] Would merge"
                );
                Ok(ExecutionReport {
                    outcome: BranchOutcome::Merged,
                    resolved_issues: resolved,
                    close_failures: Vec::new(),
                })
            }
            Action::Merge => self.merge(evaluation).await,
        }
    }

    async fn cleanup(&self, name: &str) -> Result<ExecutionReport> {
        match self.vcs.delete_remote_branch(name).await {
            Ok(()) => {
                info!(branch = %name, "Deleted fully merged branch");
                Ok(ExecutionReport::outcome(BranchOutcome::Cleaned))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(branch = %name, error = %e, "Cleanup failed");
                Ok(ExecutionReport::failed(format!("delete failed: {}", e)))
            }
        }
    }

    async fn merge(&self, evaluation: &BranchEvaluation) -> Result<ExecutionReport> {
        let name = &evaluation.branch.name;

        if let Err(e) = self.prepare_target().await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(branch = %name, target = %self.target, error = %e, "Could not prepare target");
            return Ok(ExecutionReport::failed(format!("target not ready: {}", e)));
        }

        let message = merge_message(self.target, evaluation);
        let failure = match self.vcs.merge(name, &message).await {
            Ok(MergeOutcome::Clean) => None,
            Ok(MergeOutcome::Conflicted { detail }) => Some(format!("merge conflicts: {}", detail)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => Some(format!("merge failed: {}", e)),
        };
        if let Some(reason) = failure {
            self.abort().await?;
            warn!(branch = %name, reason = %reason, "Merge rolled back");
            return Ok(ExecutionReport::failed(reason));
        }

        if let Err(e) = self.vcs.push(self.target, self.target, false).await {
            if e.is_fatal() {
                return Err(e);
            }
            self.reset_target().await?;
            warn!(branch = %name, error = %e, "Push failed; local merge discarded");
            return Ok(ExecutionReport::failed(format!("push failed: {}", e)));
        }
        info!(
            branch = %name,
            target = %self.target,
            readiness = evaluation.decision.scores.readiness,
            vision = evaluation.decision.scores.vision,
            "Merged"
        );

        let (resolved_issues, close_failures) = self.close_issues(evaluation).await;

        match self.vcs.delete_remote_branch(name).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(branch = %name, error = %e, "Merged branch could not be deleted"),
        }

        Ok(ExecutionReport {
            outcome: BranchOutcome::Merged,
            resolved_issues,
            close_failures,
        })
    }

    async fn prepare_target(&self) -> Result<()> {
        self.vcs.checkout(self.target).await?;
        self.vcs.pull(self.target).await
    }

    async fn abort(&self) -> Result<()> {
        match self.vcs.abort_merge().await {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Merge abort failed");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn reset_target(&self) -> Result<()> {
        match self.vcs.create_branch(self.target, self.target).await {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    target = %self.target,
                    error = %e,
                    "Could not reset target after failed push"
                );
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn close_issues(&self, evaluation: &BranchEvaluation) -> (Vec<u64>, Vec<u64>) {
        let verified = evaluation.verified_issues();
        let Some(tracker) = self.tracker else {
            return (Vec::new(), Vec::new());
        };

        let comment = close_comment(self.target, evaluation);
        let mut closed = Vec::new();
        let mut failures = Vec::new();
        for number in verified {
            match tracker.close_issue(number, &comment).await {
                Ok(()) => {
                    info!(issue = number, branch = %evaluation.branch.name, "Closed issue");
                    closed.push(number);
                }
                Err(e) => {
                    warn!(issue = number, error = %e, "Failed to close issue");
                    failures.push(number);
                }
            }
        }
        (closed, failures)
    }
}
