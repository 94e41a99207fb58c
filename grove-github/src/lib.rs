//! Grove GitHub - GitHub integration for Grove
//!
//! This crate provides the GitHub Issues implementation of the issue
//! tracker used by the triage engine: listing open issues, looking up a
//! single issue, and closing resolved issues with an audit comment.

mod client;
mod error;
mod issues;
mod tracker;

pub use client::{parse_github_url, GitHubClient};
pub use error::{Error, Result};
pub use issues::{Issue, IssueFilter, IssueState};
