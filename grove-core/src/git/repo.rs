//! Git repository detection and read-only history queries

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use git2::{BranchType, Oid, Repository, StatusOptions};

use super::vcs::MergeOutcome;
use crate::{Error, Result};

/// Information about a git remote
#[derive(Debug, Clone)]
pub struct RemoteInfo {
    /// Name of the remote (e.g., "origin")
    pub name: String,
    /// URL of the remote
    pub url: String,
}

/// A git repository wrapper for the read side of branch triage
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// This will search upward from the given path to find the repository root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!(
                    "Not a git repository: {}. Run grove from inside the repository to triage.",
                    path.display()
                ))
            } else {
                Error::Git(e.message().to_string())
            }
        })?;

        // merges need a working tree
        let root = repo
            .workdir()
            .ok_or_else(|| Error::Config("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a remote by name
    pub fn remote(&self, name: &str) -> Result<RemoteInfo> {
        let remote = self
            .repo
            .find_remote(name)
            .map_err(|e| Error::Config(format!("Remote '{}' not found: {}", name, e.message())))?;

        let url = remote
            .url()
            .ok_or_else(|| Error::Config(format!("Remote '{}' has no usable URL", name)))?;

        Ok(RemoteInfo {
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    /// Get the default integration branch name for a remote (main or master)
    pub fn default_branch(&self, remote: &str) -> String {
        let candidates = [
            format!("refs/remotes/{}/main", remote),
            format!("refs/remotes/{}/master", remote),
            "refs/heads/main".to_string(),
            "refs/heads/master".to_string(),
        ];

        candidates
            .iter()
            .find(|r| self.repo.find_reference(r).is_ok())
            .and_then(|r| r.rsplit('/').next())
            .unwrap_or("main")
            .to_string()
    }

    /// List remote-tracking branches on `remote` whose short name starts with `prefix`
    ///
    /// Names are returned without the remote component and sorted.
    pub fn list_remote_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>> {
        let remote_prefix = format!("{}/", remote);
        let mut branches = Vec::new();

        for branch in self.repo.branches(Some(BranchType::Remote))? {
            let (branch, _) = branch?;
            let Some(name) = branch.name().ok().flatten() else {
                continue;
            };
            let Some(short) = name.strip_prefix(&remote_prefix) else {
                continue;
            };
            if short != "HEAD" && short.starts_with(prefix) {
                branches.push(short.to_string());
            }
        }

        branches.sort();
        Ok(branches)
    }

    /// Resolve a revision (branch, remote ref, sha) to a commit id
    pub fn resolve(&self, rev: &str) -> Result<Oid> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|e| Error::Git(format!("Cannot resolve '{}': {}", rev, e.message())))?;
        Ok(object.peel_to_commit()?.id())
    }

    /// Count commits reachable from `to` but not from `from` (`git rev-list --count from..to`)
    pub fn count_commits(&self, from: &str, to: &str) -> Result<u32> {
        let mut walk = self.repo.revwalk()?;
        walk.push(self.resolve(to)?)?;
        walk.hide(self.resolve(from)?)?;

        let mut count = 0u32;
        for oid in walk {
            oid?;
            count += 1;
        }
        Ok(count)
    }

    /// Messages of commits in `from..to`, newest first
    pub fn commit_messages(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let mut walk = self.repo.revwalk()?;
        walk.push(self.resolve(to)?)?;
        walk.hide(self.resolve(from)?)?;

        let mut messages = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            messages.push(commit.message().unwrap_or_default().to_string());
        }
        Ok(messages)
    }

    /// Whether tracked files have staged or unstaged modifications
    ///
    /// Untracked files are ignored; git refuses to overwrite them anyway.
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = self.repo.statuses(Some(&mut options))?;
        Ok(!statuses.is_empty())
    }

    /// Merge `source` into `target` in memory and report whether it conflicts
    ///
    /// Neither the working checkout, the index nor any ref is touched.
    pub fn trial_merge(&self, target: &str, source: &str) -> Result<MergeOutcome> {
        let ours = self.repo.find_commit(self.resolve(target)?)?;
        let theirs = self.repo.find_commit(self.resolve(source)?)?;
        let index = self.repo.merge_commits(&ours, &theirs, None)?;

        if !index.has_conflicts() {
            return Ok(MergeOutcome::Clean);
        }

        let mut paths = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                paths.push(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        Ok(MergeOutcome::Conflicted {
            detail: format!("conflicts in {}", paths.join(", ")),
        })
    }

    /// Commit time of the tip of `rev`
    pub fn tip_time(&self, rev: &str) -> Result<DateTime<Utc>> {
        let commit = self.repo.find_commit(self.resolve(rev)?)?;
        Utc.timestamp_opt(commit.time().seconds(), 0)
            .single()
            .ok_or_else(|| Error::Git(format!("Commit time of '{}' is out of range", rev)))
    }
}
