//! Merge decision engine
//!
//! A pure function from a branch's metrics and scores to an action. Rule
//! precedence is fixed; thresholds come from [`PolicyConfig`].

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::branch::Branch;
use super::readiness::ReadinessReport;
use super::vision::VisionScore;
use crate::config::PolicyConfig;

/// What to do with a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Cleanup,
    Merge,
    Skip,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Cleanup => write!(f, "cleanup"),
            Action::Merge => write!(f, "merge"),
            Action::Skip => write!(f, "skip"),
        }
    }
}

/// The rule that produced a decision, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    FullyMerged,
    ExcellentSmallScope,
    RecentAndClean,
    Aggressive,
    HasIssues,
    InsufficientScore,
}

/// Scores a decision was based on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreSnapshot {
    pub readiness: u32,
    pub vision: u32,
    pub total: u32,
    pub issues: Vec<String>,
}

/// An immutable decision for one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub rule: DecisionRule,
    pub justification: String,
    pub scores: ScoreSnapshot,
}

impl Decision {
    fn new(
        action: Action,
        rule: DecisionRule,
        justification: String,
        scores: ScoreSnapshot,
    ) -> Self {
        Self {
            action,
            rule,
            justification,
            scores,
        }
    }
}

/// Decide what to do with a branch
///
/// First matching rule wins:
/// 1. nothing ahead of target: cleanup
/// 2. no issues, excellent total, small scope: merge
/// 3. no issues, good total, very recent: merge
/// 4. aggressive mode, acceptable total, at most minor issues: merge
/// 5. any issues: skip
/// 6. otherwise: skip
pub fn decide(
    branch: &Branch,
    readiness: &ReadinessReport,
    vision: &VisionScore,
    policy: &PolicyConfig,
    aggressive: bool,
    now: DateTime<Utc>,
) -> Decision {
    let total = readiness.score + vision.score;
    let issues = &readiness.issues;
    let scores = ScoreSnapshot {
        readiness: readiness.score,
        vision: vision.score,
        total,
        issues: issues.clone(),
    };

    // clock skew can put the tip in the future
    let age = (now - branch.last_activity).max(Duration::zero());

    if branch.commits_ahead == 0 {
        return Decision::new(
            Action::Cleanup,
            DecisionRule::FullyMerged,
            "fully merged: no commits ahead of target".to_string(),
            scores,
        );
    }

    if issues.is_empty()
        && total >= policy.excellent_total
        && branch.commits_ahead <= policy.excellent_max_commits
    {
        return Decision::new(
            Action::Merge,
            DecisionRule::ExcellentSmallScope,
            format!(
                "excellent readiness, high alignment, small scope ({} commits, total {})",
                branch.commits_ahead, total
            ),
            scores,
        );
    }

    if issues.is_empty()
        && total >= policy.recent_total
        && age <= Duration::hours(policy.recent_max_age_hours)
    {
        return Decision::new(
            Action::Merge,
            DecisionRule::RecentAndClean,
            format!(
                "no issues, good scores, very recent ({}h old, total {})",
                age.num_hours(),
                total
            ),
            scores,
        );
    }

    if aggressive
        && total >= policy.aggressive_total
        && issues.len() <= policy.aggressive_max_issues
    {
        let detail = if issues.is_empty() {
            String::new()
        } else {
            format!("; accepted: {}", issues.join(", "))
        };
        return Decision::new(
            Action::Merge,
            DecisionRule::Aggressive,
            format!("aggressive: acceptable scores, minor issues (total {}){}", total, detail),
            scores,
        );
    }

    if !issues.is_empty() {
        return Decision::new(
            Action::Skip,
            DecisionRule::HasIssues,
            format!("issues: {}", issues.join(", ")),
            scores,
        );
    }

    Decision::new(
        Action::Skip,
        DecisionRule::InsufficientScore,
        format!("insufficient score (total {})", total),
        scores,
    )
}
