//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Issue not found
    #[error("Issue #{0} not found")]
    IssueNotFound(u64),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<Error> for grove_core::Error {
    fn from(err: Error) -> Self {
        grove_core::Error::Tracker(err.to_string())
    }
}
