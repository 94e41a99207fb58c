//! Issue tracker capability and the per-run issue snapshot

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::Result;

/// Priority of a tracked issue, derived from its labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssuePriority {
    High,
    Medium,
    Low,
}

impl IssuePriority {
    /// Derive a priority from issue labels; unlabeled issues are LOW
    pub fn from_labels(labels: &[String]) -> Self {
        let normalized: Vec<String> = labels
            .iter()
            .map(|l| l.to_lowercase().replace(['/', ':', '-', '_'], " "))
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect();

        let has = |names: &[&str]| normalized.iter().any(|l| names.contains(&l.as_str()));

        if has(&[
            "priority high",
            "high priority",
            "high",
            "p0",
            "p1",
            "critical",
            "urgent",
        ]) {
            IssuePriority::High
        } else if has(&["priority medium", "medium priority", "medium", "p2"]) {
            IssuePriority::Medium
        } else {
            IssuePriority::Low
        }
    }
}

impl std::fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssuePriority::High => write!(f, "HIGH"),
            IssuePriority::Medium => write!(f, "MEDIUM"),
            IssuePriority::Low => write!(f, "LOW"),
        }
    }
}

/// An issue as seen by the triage engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedIssue {
    /// Issue number
    pub number: u64,
    /// Issue title
    pub title: String,
    /// Label names
    pub labels: Vec<String>,
    /// When the issue was created
    pub created_at: DateTime<Utc>,
    /// Whether the issue is still open
    pub open: bool,
}

impl TrackedIssue {
    /// Priority derived from labels
    pub fn priority(&self) -> IssuePriority {
        IssuePriority::from_labels(&self.labels)
    }
}

/// Operations the triage engine needs from the issue tracker
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// All open issues
    async fn list_open_issues(&self) -> Result<Vec<TrackedIssue>>;

    /// A single issue, or None if it does not exist
    async fn view_issue(&self, number: u64) -> Result<Option<TrackedIssue>>;

    /// Close an issue, leaving `comment` on it first
    async fn close_issue(&self, number: u64, comment: &str) -> Result<()>;
}

/// Open issues fetched once at the start of a run
///
/// Never mutated afterwards; consumers receive it by reference.
#[derive(Debug, Clone, Default)]
pub struct IssueSnapshot {
    issues: BTreeMap<u64, TrackedIssue>,
    available: bool,
}

impl IssueSnapshot {
    /// Snapshot of the given issues
    pub fn from_issues(issues: impl IntoIterator<Item = TrackedIssue>) -> Self {
        Self {
            issues: issues.into_iter().map(|i| (i.number, i)).collect(),
            available: true,
        }
    }

    /// Snapshot used when no tracker is reachable
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Fetch open issues; tracker failures degrade to an unavailable snapshot
    pub async fn fetch(tracker: Option<&dyn IssueTracker>) -> Self {
        let Some(tracker) = tracker else {
            info!("No issue tracker configured; issue references will be unscored");
            return Self::unavailable();
        };

        match tracker.list_open_issues().await {
            Ok(issues) => {
                info!(count = issues.len(), "Fetched open issues");
                Self::from_issues(issues)
            }
            Err(e) => {
                warn!(error = %e, "Issue tracker unavailable; issue references will be unscored");
                Self::unavailable()
            }
        }
    }

    /// Look up an open issue
    pub fn get(&self, number: u64) -> Option<&TrackedIssue> {
        self.issues.get(&number)
    }

    /// Whether the tracker answered when the snapshot was taken
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Number of open issues in the snapshot
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether the snapshot holds no issues
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}
