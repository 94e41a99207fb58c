//! GitHub API client using octocrab

use crate::{Error, Result};
use grove_core::Secrets;
use octocrab::Octocrab;
use tracing::info;

/// GitHub API client for repository operations
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a new GitHub client for the specified repository
    ///
    /// Token is loaded from (in priority order):
    /// 1. GROVE_GITHUB_TOKEN or GITHUB_TOKEN environment variable
    /// 2. ~/.config/grove/secrets.toml
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        let secrets = Secrets::load().map_err(|e| Error::Auth(e.to_string()))?;

        let token = secrets.github_token().ok_or_else(|| {
            Error::Auth(
                "GitHub token not found. Set GITHUB_TOKEN environment variable \
                 or add token to ~/.config/grove/secrets.toml"
                    .to_string(),
            )
        })?;

        Self::with_token(owner, repo, token)
    }

    /// Create a client with an explicit token
    pub fn with_token(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: String,
    ) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, "Created GitHub client");

        Ok(Self {
            client,
            owner,
            repo,
        })
    }

    /// Create a GitHub client from a repository URL
    ///
    /// Supports formats:
    /// - owner/repo
    /// - https://github.com/owner/repo
    /// - git@github.com:owner/repo.git
    pub fn from_url(url: &str) -> Result<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Self::new(owner, repo)
    }

    /// Get the repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Get the underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Parse a GitHub URL into owner and repo
///
/// Remotes on other hosts are rejected so a non-GitHub origin never gets
/// a tracker attached by accident.
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let invalid = || {
        Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        ))
    };

    if !url.contains("://") && !url.contains('@') {
        let parts: Vec<&str> = url.split('/').collect();
        return match parts.as_slice() {
            [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
                Ok((owner.to_string(), repo.trim_end_matches(".git").to_string()))
            }
            _ => Err(invalid()),
        };
    }

    // https://github.com/owner/repo
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with("ssh://") {
        let parsed = url::Url::parse(url).map_err(|e| Error::Parse(e.to_string()))?;
        if parsed.host_str() != Some("github.com") {
            return Err(Error::Parse(format!("Not a GitHub URL: {}", url)));
        }
        let path = parsed.path().trim_start_matches('/').trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
        return Err(Error::Parse(format!("Invalid GitHub URL path: {}", path)));
    }

    // git@github.com:owner/repo.git
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        let path = rest.trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
        return Err(Error::Parse(format!("Invalid SSH URL: {}", url)));
    }

    Err(Error::Parse(format!("Unrecognized URL format: {}", url)))
}
