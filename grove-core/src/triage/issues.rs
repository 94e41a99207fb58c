//! Issue references carried by a branch
//!
//! References come from the branch name (`issue-42`) and commit messages
//! (`#42`, `fixes #42`). They only count toward alignment once the tracker
//! confirms the issue is open.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::tracker::{IssuePriority, IssueSnapshot, IssueTracker};

/// Where a reference's validity comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// The tracker confirmed an open issue with this number
    Verified,
    /// Only the text mentions it
    TextOnly,
}

/// An issue number found on a branch, with what the tracker said about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIssueRef {
    /// Issue number
    pub number: u64,
    /// Whether the tracker confirmed it
    pub provenance: Provenance,
    /// Priority from labels, present when verified
    pub priority: Option<IssuePriority>,
}

impl ResolvedIssueRef {
    fn verified(number: u64, priority: IssuePriority) -> Self {
        Self {
            number,
            provenance: Provenance::Verified,
            priority: Some(priority),
        }
    }

    fn text_only(number: u64) -> Self {
        Self {
            number,
            provenance: Provenance::TextOnly,
            priority: None,
        }
    }

    /// Whether the tracker confirmed this reference
    pub fn is_verified(&self) -> bool {
        self.provenance == Provenance::Verified
    }
}

/// Leading decimal digits of `s`, if any
fn leading_number(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// Numbers following `issue-`, `issue/` or `issue_` in a branch name
fn numbers_in_branch_name(name: &str) -> Vec<u64> {
    let lower = name.to_lowercase();
    lower
        .match_indices("issue")
        .filter_map(|(idx, m)| {
            let rest = &lower[idx + m.len()..];
            let rest = rest.strip_prefix(['-', '/', '_'])?;
            leading_number(rest)
        })
        .collect()
}

/// Numbers following `#` in a commit message
fn numbers_in_message(message: &str) -> Vec<u64> {
    message
        .match_indices('#')
        .filter(|(idx, _)| {
            // skip things like `abc#12` that are not references
            message[..*idx]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
        })
        .filter_map(|(idx, _)| leading_number(&message[idx + 1..]))
        .collect()
}

/// All issue numbers a branch mentions, sorted and deduplicated
pub fn extract_issue_numbers(branch_name: &str, messages: &[String]) -> Vec<u64> {
    let mut numbers: BTreeSet<u64> = numbers_in_branch_name(branch_name).into_iter().collect();
    for message in messages {
        numbers.extend(numbers_in_message(message));
    }
    numbers.into_iter().collect()
}

/// Check each number against the snapshot, then the tracker
///
/// Numbers missing from the snapshot are looked up individually; an open
/// issue found that way is verified. Without a reachable tracker every
/// reference stays text-only.
pub async fn resolve_issue_refs(
    numbers: &[u64],
    snapshot: &IssueSnapshot,
    tracker: Option<&dyn IssueTracker>,
) -> Vec<ResolvedIssueRef> {
    let mut refs = Vec::with_capacity(numbers.len());

    for &number in numbers {
        if let Some(issue) = snapshot.get(number) {
            refs.push(ResolvedIssueRef::verified(number, issue.priority()));
            continue;
        }

        let tracker = match tracker {
            Some(t) if snapshot.is_available() => t,
            _ => {
                refs.push(ResolvedIssueRef::text_only(number));
                continue;
            }
        };

        match tracker.view_issue(number).await {
            Ok(Some(issue)) if issue.open => {
                debug!(issue = number, "Verified issue outside the snapshot");
                refs.push(ResolvedIssueRef::verified(number, issue.priority()));
            }
            Ok(_) => refs.push(ResolvedIssueRef::text_only(number)),
            Err(e) => {
                warn!(issue = number, error = %e, "Issue lookup failed");
                refs.push(ResolvedIssueRef::text_only(number));
            }
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::testing::FakeTracker;

    fn messages(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_branch_name_references() {
        assert_eq!(numbers_in_branch_name("claude/issue-42-wallet"), vec![42]);
        assert_eq!(numbers_in_branch_name("claude/Issue_7"), vec![7]);
        assert_eq!(numbers_in_branch_name("claude/issue/9"), vec![9]);
        assert!(numbers_in_branch_name("claude/issues-list").is_empty());
        assert!(numbers_in_branch_name("claude/upload-42").is_empty());
    }

    #[test]
    fn test_message_references() {
        assert_eq!(numbers_in_message("Fixes #12 and closes #3"), vec![12, 3]);
        assert_eq!(numbers_in_message("(#5)"), vec![5]);
        assert!(numbers_in_message("color: #fff").is_empty());
        assert!(numbers_in_message("abc#12").is_empty());
        assert!(numbers_in_message("#0").is_empty());
    }

    #[test]
    fn test_extract_sorted_and_deduplicated() {
        let numbers = extract_issue_numbers(
            "claude/issue-12",
            &messages(&["Fix #12", "Refs #4", "Add upload"]),
        );
        assert_eq!(numbers, vec![4, 12]);
    }

    #[tokio::test]
    async fn test_snapshot_hits_are_verified_with_priority() {
        let tracker = FakeTracker::new()
            .with_issue(1, &["priority: high"], true)
            .with_issue(2, &[], true);
        let snapshot = IssueSnapshot::fetch(Some(&tracker)).await;

        let refs = resolve_issue_refs(&[1, 2], &snapshot, Some(&tracker)).await;
        assert_eq!(refs[0], ResolvedIssueRef::verified(1, IssuePriority::High));
        assert_eq!(refs[1], ResolvedIssueRef::verified(2, IssuePriority::Low));
    }

    #[tokio::test]
    async fn test_misses_fall_back_to_lookup() {
        let tracker = FakeTracker::new().with_issue(8, &["bug"], false);
        let snapshot = IssueSnapshot::fetch(Some(&tracker)).await;

        // closed and unknown issues are text-only
        let refs = resolve_issue_refs(&[8, 99], &snapshot, Some(&tracker)).await;
        assert!(refs.iter().all(|r| !r.is_verified()));
        assert!(refs.iter().all(|r| r.priority.is_none()));
    }

    #[tokio::test]
    async fn test_unavailable_tracker_leaves_references_text_only() {
        let tracker = FakeTracker::new()
            .with_issue(1, &["high"], true)
            .failing_list();
        let snapshot = IssueSnapshot::fetch(Some(&tracker)).await;

        let refs = resolve_issue_refs(&[1], &snapshot, Some(&tracker)).await;
        assert_eq!(refs, vec![ResolvedIssueRef::text_only(1)]);

        let refs = resolve_issue_refs(&[1], &IssueSnapshot::unavailable(), None).await;
        assert_eq!(refs, vec![ResolvedIssueRef::text_only(1)]);
    }
}
