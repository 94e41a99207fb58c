//! Triage run orchestration
//!
//! Drives one run end to end:
//! 1. Fetches the issue snapshot and discovers candidate branches
//! 2. Evaluates, decides and executes each branch in turn
//! 3. Consolidates the branches left standing
//! 4. Builds the report

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::branch::{Branch, BranchEvaluation};
use super::consolidate::Consolidator;
use super::decision::decide;
use super::discovery::{discover, load_branch, DiscoveryOutcome};
use super::executor::{BranchOutcome, Executor};
use super::issues::{extract_issue_numbers, resolve_issue_refs};
use super::readiness::evaluate_readiness;
use super::report::{BranchRecord, RunReport};
use super::vision::score_vision;
use crate::config::Config;
use crate::git::Vcs;
use crate::tracker::{IssueSnapshot, IssueTracker};
use crate::Result;

/// Phase of a triage run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriagePhase {
    Discovery,
    Evaluation,
    Consolidation,
    Reporting,
}

impl TriagePhase {
    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            TriagePhase::Discovery => "Discovering candidate branches",
            TriagePhase::Evaluation => "Evaluating and acting on branches",
            TriagePhase::Consolidation => "Consolidating overlapping branches",
            TriagePhase::Reporting => "Summarizing the run",
        }
    }
}

impl std::fmt::Display for TriagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Per-run switches
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Integration branch
    pub target: String,
    /// Decide and log without mutating anything
    pub dry_run: bool,
    /// Relax the merge policy
    pub aggressive: bool,
}

impl RunOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            dry_run: false,
            aggressive: false,
        }
    }

    /// Set dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set aggressive mode
    pub fn with_aggressive(mut self, aggressive: bool) -> Self {
        self.aggressive = aggressive;
        self
    }
}

/// One triage run over a repository
pub struct Triage<'a> {
    vcs: &'a dyn Vcs,
    tracker: Option<&'a dyn IssueTracker>,
    config: &'a Config,
    options: RunOptions,
}

impl<'a> Triage<'a> {
    pub fn new(
        vcs: &'a dyn Vcs,
        tracker: Option<&'a dyn IssueTracker>,
        config: &'a Config,
        options: RunOptions,
    ) -> Self {
        Self {
            vcs,
            tracker,
            config,
            options,
        }
    }

    fn target(&self) -> &str {
        &self.options.target
    }

    /// Run every phase
    ///
    /// Returns `Err` only for fatal errors; everything else is reflected in
    /// the report.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let dry_run = self.options.dry_run;
        let aggressive = self.options.aggressive;
        info!(
            target = %self.target(),
            dry_run,
            aggressive,
            "Starting triage run"
        );

        info!("{}", TriagePhase::Discovery);
        let snapshot = IssueSnapshot::fetch(self.tracker).await;
        let branches = match discover(self.vcs, &self.config.repo, self.target()).await? {
            DiscoveryOutcome::Failed(reason) => {
                warn!(reason = %reason, "Discovery failed; nothing to do");
                return Ok(RunReport::empty(self.target(), dry_run, aggressive, Some(reason)));
            }
            DiscoveryOutcome::Found(branches) if branches.is_empty() => {
                info!(prefix = %self.config.repo.branch_prefix, "No candidate branches");
                return Ok(RunReport::empty(self.target(), dry_run, aggressive, None));
            }
            DiscoveryOutcome::Found(branches) => branches,
        };

        info!("{}", TriagePhase::Evaluation);
        let executor = Executor::new(self.vcs, self.tracker, self.target(), dry_run);
        let mut records = Vec::with_capacity(branches.len());
        let mut target_moved = false;

        for branch in branches {
            let branch = if target_moved {
                self.refresh(branch).await?
            } else {
                branch
            };

            let evaluation = self.evaluate(branch, &snapshot, started_at).await?;
            let execution = executor.execute(&evaluation).await?;
            if execution.outcome == BranchOutcome::Merged && !dry_run {
                target_moved = true;
            }
            records.push(BranchRecord::new(evaluation, execution));
        }

        info!("{}", TriagePhase::Consolidation);
        let mut leftovers = Vec::new();
        for record in records.iter().filter(|r| r.outcome.is_remaining()) {
            let branch = record.evaluation.branch.clone();
            leftovers.push(if target_moved {
                self.refresh(branch).await?
            } else {
                branch
            });
        }
        let consolidation = Consolidator::new(self.vcs, self.target(), dry_run)
            .consolidate(leftovers)
            .await?;

        info!("{}", TriagePhase::Reporting);
        let report = RunReport::build(
            self.target(),
            dry_run,
            aggressive,
            records,
            consolidation.records,
            &self.config.policy,
        );
        info!(
            merged = report.summary.merged,
            cleaned = report.summary.cleaned,
            skipped = report.summary.skipped,
            failed = report.summary.failed,
            absorbed = report.summary.absorbed,
            "Triage run complete"
        );
        Ok(report)
    }

    /// Re-measure a branch after the target moved
    async fn refresh(&self, branch: Branch) -> Result<Branch> {
        match load_branch(self.vcs, self.target(), &branch.name).await {
            Ok(fresh) => Ok(fresh),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(branch = %branch.name, error = %e, "Keeping discovery metrics");
                Ok(branch)
            }
        }
    }

    /// Score a branch and decide what to do with it
    async fn evaluate(
        &self,
        branch: Branch,
        snapshot: &IssueSnapshot,
        now: DateTime<Utc>,
    ) -> Result<BranchEvaluation> {
        let readiness =
            evaluate_readiness(self.vcs, self.target(), &branch, &self.config.readiness).await?;

        let messages = match self.vcs.commit_messages(self.target(), &branch.name).await {
            Ok(messages) => messages,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!(branch = %branch.name, error = %e, "Commit messages unavailable");
                Vec::new()
            }
        };
        let numbers = extract_issue_numbers(&branch.name, &messages);
        let issue_refs = resolve_issue_refs(&numbers, snapshot, self.tracker).await;

        let vision = score_vision(&branch, &issue_refs, &self.config.vision);
        let decision = decide(
            &branch,
            &readiness,
            &vision,
            &self.config.policy,
            self.options.aggressive,
            now,
        );

        let evaluation = BranchEvaluation {
            branch,
            readiness,
            issue_refs,
            vision,
            decision,
        };

        info!(
            branch = %evaluation.branch.name,
            ahead = evaluation.branch.commits_ahead,
            behind = evaluation.branch.commits_behind,
            readiness = evaluation.readiness.score,
            vision = evaluation.vision.score,
            total = evaluation.decision.scores.total,
            action = %evaluation.decision.action,
            issues_verified = ?evaluation.verified_issues(),
            issues_unverified = ?evaluation.unverified_issues(),
            "{}",
            evaluation.decision.justification
        );

        Ok(evaluation)
    }
}
