//! GitHub Issues as the triage engine's issue tracker

use async_trait::async_trait;
use grove_core::{IssueTracker, TrackedIssue};

use crate::{Error, GitHubClient};

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn list_open_issues(&self) -> grove_core::Result<Vec<TrackedIssue>> {
        let issues = self.open_issues().await?;
        Ok(issues.into_iter().map(TrackedIssue::from).collect())
    }

    async fn view_issue(&self, number: u64) -> grove_core::Result<Option<TrackedIssue>> {
        match self.get_issue(number).await {
            Ok(issue) if issue.is_pull_request() => Ok(None),
            Ok(issue) => Ok(Some(issue.into())),
            Err(Error::IssueNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn close_issue(&self, number: u64, comment: &str) -> grove_core::Result<()> {
        self.close_issue_with_comment(number, comment).await?;
        Ok(())
    }
}
