//! Issue fetching and closing

use crate::{Error, GitHubClient, Result};
use chrono::{DateTime, Utc};
use grove_core::TrackedIssue;
use octocrab::models::issues::Issue as OctocrabIssue;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Issue state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl From<octocrab::models::IssueState> for IssueState {
    fn from(state: octocrab::models::IssueState) -> Self {
        match state {
            octocrab::models::IssueState::Closed => IssueState::Closed,
            _ => IssueState::Open,
        }
    }
}

/// GitHub issue representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number
    pub number: u64,
    /// Issue title
    pub title: String,
    /// Current state (open/closed)
    pub state: IssueState,
    /// Labels attached to the issue
    pub labels: Vec<String>,
    /// When the issue was created
    pub created_at: DateTime<Utc>,
    /// Set when this "issue" is really a pull request
    pub pull_request_url: Option<String>,
}

impl Issue {
    /// Whether this entry is a pull request rather than an issue
    pub fn is_pull_request(&self) -> bool {
        self.pull_request_url.is_some()
    }
}

impl From<OctocrabIssue> for Issue {
    fn from(issue: OctocrabIssue) -> Self {
        Issue {
            number: issue.number,
            title: issue.title,
            state: issue.state.into(),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            created_at: issue.created_at,
            pull_request_url: issue.pull_request.map(|pr| pr.url.to_string()),
        }
    }
}

impl From<Issue> for TrackedIssue {
    fn from(issue: Issue) -> Self {
        TrackedIssue {
            number: issue.number,
            title: issue.title,
            labels: issue.labels,
            created_at: issue.created_at,
            open: issue.state == IssueState::Open,
        }
    }
}

/// Filter options for listing issues
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// Filter by state (default: open)
    pub state: Option<IssueState>,
    /// Filter by labels (all must match)
    pub labels: Vec<String>,
    /// Page size (default: 100)
    pub per_page: Option<u8>,
}

impl GitHubClient {
    /// Fetch a single issue by number
    pub async fn get_issue(&self, number: u64) -> Result<Issue> {
        debug!(number, "Fetching issue");

        let issue = self
            .client()
            .issues(self.owner(), self.repo())
            .get(number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found") => {
                    Error::IssueNotFound(number)
                }
                _ => Error::Api(e),
            })?;

        Ok(issue.into())
    }

    /// List all issues matching the filter, paginating through every page
    ///
    /// Pull requests are excluded.
    pub async fn list_all_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        debug!(?filter, "Listing all issues with pagination");

        let mut all_issues = Vec::new();
        let per_page = filter.per_page.unwrap_or(100);

        let mut page_num = 1u32;
        loop {
            let issues_handler = self.client().issues(self.owner(), self.repo());
            let mut builder = issues_handler.list().per_page(per_page).page(page_num);

            if let Some(state) = filter.state {
                builder = builder.state(match state {
                    IssueState::Open => octocrab::params::State::Open,
                    IssueState::Closed => octocrab::params::State::Closed,
                });
            }

            if !filter.labels.is_empty() {
                builder = builder.labels(&filter.labels);
            }

            let page = builder.send().await.map_err(Error::Api)?;
            if page.items.is_empty() {
                break;
            }
            let full_page = page.items.len() >= usize::from(per_page);

            all_issues.extend(
                page.items
                    .into_iter()
                    .map(Issue::from)
                    .filter(|i| !i.is_pull_request()),
            );

            if !full_page {
                break;
            }
            page_num += 1;
        }

        info!(count = all_issues.len(), "Fetched all issues");

        Ok(all_issues)
    }

    /// List every open issue
    pub async fn open_issues(&self) -> Result<Vec<Issue>> {
        self.list_all_issues(&IssueFilter {
            state: Some(IssueState::Open),
            ..Default::default()
        })
        .await
    }

    /// Leave a comment on an issue, then close it
    pub async fn close_issue_with_comment(&self, number: u64, comment: &str) -> Result<()> {
        let handler = self.client().issues(self.owner(), self.repo());

        handler
            .create_comment(number, comment)
            .await
            .map_err(Error::Api)?;

        handler
            .update(number)
            .state(octocrab::models::IssueState::Closed)
            .send()
            .await
            .map_err(Error::Api)?;

        info!(number, "Closed issue");
        Ok(())
    }
}
