//! Run summary and prioritization of branches left behind

use serde::Serialize;

use super::branch::BranchEvaluation;
use super::consolidate::{ConsolidationRecord, FoldResult};
use super::executor::{BranchOutcome, ExecutionReport};
use crate::config::PolicyConfig;
use crate::tracker::IssuePriority;

/// How urgently a remaining branch needs a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemainingPriority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for RemainingPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemainingPriority::High => write!(f, "HIGH"),
            RemainingPriority::Medium => write!(f, "MEDIUM"),
            RemainingPriority::Low => write!(f, "LOW"),
        }
    }
}

/// Everything that happened to one branch
#[derive(Debug, Clone, Serialize)]
pub struct BranchRecord {
    /// Scores and decision
    pub evaluation: BranchEvaluation,
    /// Final state, including consolidation
    pub outcome: BranchOutcome,
    /// Issues closed by the merge
    pub resolved_issues: Vec<u64>,
    /// Issues the tracker refused to close
    pub close_failures: Vec<u64>,
}

impl BranchRecord {
    pub fn new(evaluation: BranchEvaluation, execution: ExecutionReport) -> Self {
        Self {
            evaluation,
            outcome: execution.outcome,
            resolved_issues: execution.resolved_issues,
            close_failures: execution.close_failures,
        }
    }

    /// Branch name
    pub fn name(&self) -> &str {
        &self.evaluation.branch.name
    }
}

/// A branch still on the remote after the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemainingBranch {
    pub name: String,
    pub priority: RemainingPriority,
    pub rationale: String,
    pub total: u32,
    pub issues: Vec<String>,
}

/// Assign a follow-up priority to a branch that was not merged
pub fn prioritize(record: &BranchRecord, policy: &PolicyConfig) -> RemainingBranch {
    let scores = &record.evaluation.decision.scores;
    let resolves_high = record
        .evaluation
        .issue_refs
        .iter()
        .any(|r| r.is_verified() && r.priority == Some(IssuePriority::High));

    let (priority, rationale) = if let BranchOutcome::Failed { reason } = &record.outcome {
        (
            RemainingPriority::High,
            format!("selected for merge but failed: {}", reason),
        )
    } else if resolves_high {
        (
            RemainingPriority::High,
            "resolves a high-priority issue".to_string(),
        )
    } else if scores.issues.len() <= 1 && scores.total >= policy.recent_total {
        let rationale = match scores.issues.first() {
            Some(issue) => format!("strong scores, one issue to fix: {}", issue),
            None => format!("strong scores (total {}), waiting on policy", scores.total),
        };
        (RemainingPriority::High, rationale)
    } else if scores.total >= policy.aggressive_total {
        (
            RemainingPriority::Medium,
            format!(
                "acceptable scores (total {}), {} issue(s)",
                scores.total,
                scores.issues.len()
            ),
        )
    } else {
        (
            RemainingPriority::Low,
            format!("low scores (total {})", scores.total),
        )
    };

    RemainingBranch {
        name: record.name().to_string(),
        priority,
        rationale,
        total: scores.total,
        issues: scores.issues.clone(),
    }
}

/// Counts over all branches in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub merged: usize,
    pub cleaned: usize,
    pub skipped: usize,
    pub failed: usize,
    pub absorbed: usize,
    pub issues_resolved: usize,
    pub issue_close_failures: usize,
}

impl RunSummary {
    /// Tally outcomes
    pub fn from_records(records: &[BranchRecord]) -> Self {
        let mut summary = Self {
            discovered: records.len(),
            ..Default::default()
        };

        for record in records {
            match record.outcome {
                BranchOutcome::Merged => summary.merged += 1,
                BranchOutcome::Cleaned => summary.cleaned += 1,
                BranchOutcome::Skipped => summary.skipped += 1,
                BranchOutcome::Failed { .. } => summary.failed += 1,
                BranchOutcome::Absorbed { .. } => summary.absorbed += 1,
            }
            summary.issues_resolved += record.resolved_issues.len();
            summary.issue_close_failures += record.close_failures.len();
        }

        summary
    }

    /// Branches that no longer need to exist: merged or cleaned up
    pub fn merged_count(&self) -> usize {
        self.merged + self.cleaned
    }
}

/// Result of a triage run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    pub dry_run: bool,
    pub aggressive: bool,
    /// Why discovery ended the run early, if it did
    pub discovery_failure: Option<String>,
    pub branches: Vec<BranchRecord>,
    pub consolidations: Vec<ConsolidationRecord>,
    /// Branches still on the remote, most urgent first
    pub remaining: Vec<RemainingBranch>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Report for a run that ended at discovery
    pub fn empty(
        target: &str,
        dry_run: bool,
        aggressive: bool,
        discovery_failure: Option<String>,
    ) -> Self {
        Self {
            target: target.to_string(),
            dry_run,
            aggressive,
            discovery_failure,
            branches: Vec::new(),
            consolidations: Vec::new(),
            remaining: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Assemble the final report
    ///
    /// Consolidation outcomes are applied to the branch records before
    /// counting, so absorbed branches are neither skipped nor remaining.
    pub fn build(
        target: &str,
        dry_run: bool,
        aggressive: bool,
        mut branches: Vec<BranchRecord>,
        consolidations: Vec<ConsolidationRecord>,
        policy: &PolicyConfig,
    ) -> Self {
        for consolidation in consolidations.iter().filter(|c| c.result.consumed()) {
            if let Some(record) = branches
                .iter_mut()
                .find(|b| b.name() == consolidation.pair.secondary)
            {
                record.outcome = BranchOutcome::Absorbed {
                    into: consolidation.pair.primary.clone(),
                };
            }
        }

        let mut remaining: Vec<RemainingBranch> = branches
            .iter()
            .filter(|b| b.outcome.is_remaining())
            .map(|b| prioritize(b, policy))
            .collect();
        // stable: equal priorities keep discovery order
        remaining.sort_by_key(|r| r.priority);

        let summary = RunSummary::from_records(&branches);

        Self {
            target: target.to_string(),
            dry_run,
            aggressive,
            discovery_failure: None,
            branches,
            consolidations,
            remaining,
            summary,
        }
    }

    /// Consolidations that did not go through
    pub fn failed_consolidations(&self) -> impl Iterator<Item = &ConsolidationRecord> {
        self.consolidations
            .iter()
            .filter(|c| matches!(c.result, FoldResult::Failed { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::branch::Branch;
    use crate::triage::consolidate::OverlapPair;
    use crate::triage::decision::{Action, Decision, DecisionRule, ScoreSnapshot};
    use crate::triage::issues::{Provenance, ResolvedIssueRef};
    use crate::triage::readiness::{Freshness, ReadinessReport};
    use crate::triage::vision::VisionScore;
    use chrono::Utc;

    fn record(name: &str, total: u32, issues: &[&str], outcome: BranchOutcome) -> BranchRecord {
        let issues: Vec<String> = issues.iter().map(|s| s.to_string()).collect();
        BranchRecord {
            evaluation: BranchEvaluation {
                branch: Branch::new(name, 2, 0, Utc::now(), vec![]),
                readiness: ReadinessReport {
                    merge_conflict_free: true,
                    quality_issue_count: 0,
                    test_coverage_adequate: true,
                    freshness: Freshness::Current,
                    score: 5,
                    issues: issues.clone(),
                },
                issue_refs: vec![],
                vision: VisionScore {
                    score: total.saturating_sub(5),
                    categories: vec![],
                    issue_bonus: 0,
                    build_penalty: false,
                },
                decision: Decision {
                    action: Action::Skip,
                    rule: DecisionRule::HasIssues,
                    justification: String::new(),
                    scores: ScoreSnapshot {
                        readiness: 5,
                        vision: total.saturating_sub(5),
                        total,
                        issues,
                    },
                },
            },
            outcome,
            resolved_issues: vec![],
            close_failures: vec![],
        }
    }

    #[test]
    fn test_priority_heuristic() {
        let policy = PolicyConfig::default();

        let failed = record(
            "claude/a",
            5,
            &[],
            BranchOutcome::Failed {
                reason: "merge conflicts".to_string(),
            },
        );
        assert_eq!(prioritize(&failed, &policy).priority, RemainingPriority::High);

        let nearly = record("claude/b", 13, &["missing tests"], BranchOutcome::Skipped);
        assert_eq!(prioritize(&nearly, &policy).priority, RemainingPriority::High);

        let middling = record(
            "claude/c",
            11,
            &["missing tests", "merge conflicts"],
            BranchOutcome::Skipped,
        );
        assert_eq!(prioritize(&middling, &policy).priority, RemainingPriority::Medium);

        let weak = record("claude/d", 7, &["merge conflicts"], BranchOutcome::Skipped);
        assert_eq!(prioritize(&weak, &policy).priority, RemainingPriority::Low);

        let mut important = record("claude/e", 7, &["merge conflicts"], BranchOutcome::Skipped);
        important.evaluation.issue_refs.push(ResolvedIssueRef {
            number: 4,
            provenance: Provenance::Verified,
            priority: Some(IssuePriority::High),
        });
        let remaining = prioritize(&important, &policy);
        assert_eq!(remaining.priority, RemainingPriority::High);
        assert!(remaining.rationale.contains("high-priority"));
    }

    #[test]
    fn test_build_applies_consolidation_and_orders_remaining() {
        let records = vec![
            record("claude/low", 6, &["merge conflicts"], BranchOutcome::Skipped),
            record("claude/merged", 17, &[], BranchOutcome::Merged),
            record("claude/high", 13, &["missing tests"], BranchOutcome::Skipped),
            record("claude/gone", 7, &["missing tests"], BranchOutcome::Skipped),
            record("claude/clean", 0, &[], BranchOutcome::Cleaned),
        ];
        let consolidations = vec![ConsolidationRecord {
            pair: OverlapPair {
                primary: "claude/high".to_string(),
                secondary: "claude/gone".to_string(),
                shared_file_count: 2,
            },
            result: FoldResult::Folded,
        }];

        let report = RunReport::build(
            "main",
            false,
            false,
            records,
            consolidations,
            &PolicyConfig::default(),
        );

        let remaining: Vec<&str> = report.remaining.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(remaining, vec!["claude/high", "claude/low"]);

        assert_eq!(report.summary.discovered, 5);
        assert_eq!(report.summary.merged, 1);
        assert_eq!(report.summary.cleaned, 1);
        assert_eq!(report.summary.merged_count(), 2);
        assert_eq!(report.summary.skipped, 2);
        assert_eq!(report.summary.absorbed, 1);
        assert_eq!(
            report.branches[3].outcome,
            BranchOutcome::Absorbed {
                into: "claude/high".to_string()
            }
        );
    }

    #[test]
    fn test_failed_fold_keeps_secondary_remaining() {
        let records = vec![
            record("claude/a", 6, &["merge conflicts"], BranchOutcome::Skipped),
            record("claude/b", 6, &["merge conflicts"], BranchOutcome::Skipped),
        ];
        let consolidations = vec![ConsolidationRecord {
            pair: OverlapPair {
                primary: "claude/a".to_string(),
                secondary: "claude/b".to_string(),
                shared_file_count: 1,
            },
            result: FoldResult::Failed {
                reason: "merge conflicts".to_string(),
            },
        }];

        let report = RunReport::build(
            "main",
            false,
            false,
            records,
            consolidations,
            &PolicyConfig::default(),
        );
        assert_eq!(report.remaining.len(), 2);
        assert_eq!(report.failed_consolidations().count(), 1);
    }
}
