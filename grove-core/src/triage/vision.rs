//! Vision alignment scoring
//!
//! Measures how relevant a branch is to the product: which parts of the
//! tree it touches and which open issues it resolves.

use serde::Serialize;
use tracing::debug;

use super::branch::Branch;
use super::issues::ResolvedIssueRef;
use crate::config::VisionConfig;
use crate::tracker::IssuePriority;

/// Lowest possible vision score
pub const VISION_MIN: i64 = 1;
/// Highest possible vision score
pub const VISION_MAX: i64 = 10;

/// Area of the tree a branch touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Service,
    Ui,
    Domain,
    Styling,
    Build,
}

impl ChangeCategory {
    /// All categories, in scoring order
    pub const ALL: [ChangeCategory; 5] = [
        ChangeCategory::Service,
        ChangeCategory::Ui,
        ChangeCategory::Domain,
        ChangeCategory::Styling,
        ChangeCategory::Build,
    ];

    fn bonus(self, config: &VisionConfig) -> i64 {
        match self {
            ChangeCategory::Service => config.service_bonus,
            ChangeCategory::Ui => config.ui_bonus,
            ChangeCategory::Domain => config.domain_bonus,
            ChangeCategory::Styling => config.styling_bonus,
            ChangeCategory::Build => config.build_bonus,
        }
    }

    fn matches(self, branch: &Branch, config: &VisionConfig) -> bool {
        let paths = || branch.changed_files.iter().map(|p| p.to_lowercase());
        let any_fragment = |patterns: &[String]| {
            paths().any(|path| {
                patterns
                    .iter()
                    .any(|p| path.contains(p.to_lowercase().as_str()))
            })
        };

        match self {
            ChangeCategory::Service => any_fragment(&config.service_patterns),
            ChangeCategory::Ui => any_fragment(&config.ui_patterns),
            ChangeCategory::Styling => any_fragment(&config.styling_patterns),
            ChangeCategory::Domain => {
                let name = branch.name.to_lowercase();
                any_fragment(&config.domain_keywords)
                    || config
                        .domain_keywords
                        .iter()
                        .any(|k| name.contains(k.to_lowercase().as_str()))
            }
            ChangeCategory::Build => branch.changed_files.iter().any(|path| {
                let file_name = path.rsplit('/').next().unwrap_or(path);
                config.build_patterns.iter().any(|p| file_name == p)
            }),
        }
    }
}

impl std::fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeCategory::Service => write!(f, "service layer"),
            ChangeCategory::Ui => write!(f, "UI components"),
            ChangeCategory::Domain => write!(f, "domain integration"),
            ChangeCategory::Styling => write!(f, "styling"),
            ChangeCategory::Build => write!(f, "build configuration"),
        }
    }
}

/// Domain alignment of a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisionScore {
    /// Final score in `[VISION_MIN, VISION_MAX]`
    pub score: u32,
    /// Categories the branch touched
    pub categories: Vec<ChangeCategory>,
    /// Sum of verified issue bonuses
    pub issue_bonus: i64,
    /// Whether the large-branch build penalty applied
    pub build_penalty: bool,
}

fn issue_bonus(priority: IssuePriority, config: &VisionConfig) -> i64 {
    match priority {
        IssuePriority::High => config.high_issue_bonus,
        IssuePriority::Medium => config.medium_issue_bonus,
        IssuePriority::Low => config.low_issue_bonus,
    }
}

/// Score a branch's alignment; text-only issue references add nothing
pub fn score_vision(
    branch: &Branch,
    issue_refs: &[ResolvedIssueRef],
    config: &VisionConfig,
) -> VisionScore {
    let issue_total: i64 = issue_refs
        .iter()
        .filter(|r| r.is_verified())
        .filter_map(|r| r.priority)
        .map(|p| issue_bonus(p, config))
        .sum();

    let categories: Vec<ChangeCategory> = ChangeCategory::ALL
        .into_iter()
        .filter(|c| c.matches(branch, config))
        .collect();
    let category_total: i64 = categories.iter().map(|c| c.bonus(config)).sum();

    let build_penalty = categories.contains(&ChangeCategory::Build)
        && branch.commits_ahead > config.build_penalty_commits;
    let penalty = if build_penalty { config.build_penalty } else { 0 };

    let raw = config.base + issue_total + category_total - penalty;
    let score = raw.clamp(VISION_MIN, VISION_MAX) as u32;

    debug!(
        branch = %branch.name,
        raw,
        vision = score,
        categories = ?categories,
        "Vision scored"
    );

    VisionScore {
        score,
        categories,
        issue_bonus: issue_total,
        build_penalty,
    }
}
