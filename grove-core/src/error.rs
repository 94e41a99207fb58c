//! Error types for Grove

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for Grove operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Grove operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git operation failed
    #[error("Git error: {0}")]
    Git(String),

    /// A git command did not finish within the configured timeout
    #[error("git {command} timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// The git subcommand that hung
        command: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The working checkout has uncommitted changes to tracked files
    #[error("Uncommitted changes in {}; commit or stash them before triage", .0.display())]
    DirtyCheckout(PathBuf),

    /// Issue tracker error
    #[error("Issue tracker error: {0}")]
    Tracker(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the whole run
    ///
    /// A hung git process leaves the shared checkout in an unknown state, so
    /// nothing after it can be trusted. A dirty checkout means any branch
    /// switch could destroy the user's work.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::DirtyCheckout(_))
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::Git(err.message().to_string())
    }
}
