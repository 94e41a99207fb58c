//! Candidate branch discovery

use tracing::{debug, info, warn};

use super::branch::Branch;
use crate::config::RepoConfig;
use crate::git::Vcs;
use crate::Result;

/// What discovery found
///
/// A failed listing and an empty listing both end the run, but only the
/// first is a problem worth reporting.
#[derive(Debug, Clone)]
pub enum DiscoveryOutcome {
    /// Candidate branches, in name order, bounded by `max_branches`
    Found(Vec<Branch>),
    /// Branches could not be listed
    Failed(String),
}

impl DiscoveryOutcome {
    /// Branches found, empty on failure
    pub fn branches(&self) -> &[Branch] {
        match self {
            DiscoveryOutcome::Found(branches) => branches,
            DiscoveryOutcome::Failed(_) => &[],
        }
    }
}

/// Measure a single branch against the target
pub async fn load_branch(vcs: &dyn Vcs, target: &str, name: &str) -> Result<Branch> {
    let commits_ahead = vcs.commit_count(target, name).await?;
    let commits_behind = vcs.commit_count(name, target).await?;
    let last_activity = vcs.last_commit_time(name).await?;
    let changes = vcs.file_changes(target, name).await?;

    Ok(Branch::new(
        name,
        commits_ahead,
        commits_behind,
        last_activity,
        changes,
    ))
}

/// Enumerate and measure candidate branches
///
/// Only fatal errors are returned as `Err`; everything else degrades to a
/// `Failed` outcome or a skipped branch.
pub async fn discover(
    vcs: &dyn Vcs,
    config: &RepoConfig,
    target: &str,
) -> Result<DiscoveryOutcome> {
    match vcs.fetch().await {
        Ok(()) => debug!(remote = %config.remote, "Fetched remote"),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => warn!(error = %e, "Fetch failed; continuing with local refs"),
    }

    let mut names = match vcs.list_branches(&config.branch_prefix).await {
        Ok(names) => names,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(error = %e, prefix = %config.branch_prefix, "Branch discovery failed");
            return Ok(DiscoveryOutcome::Failed(e.to_string()));
        }
    };

    names.retain(|n| n != target);
    if names.len() > config.max_branches {
        info!(
            found = names.len(),
            limit = config.max_branches,
            "Limiting candidate branches"
        );
        names.truncate(config.max_branches);
    }

    let mut branches = Vec::with_capacity(names.len());
    for name in names {
        match load_branch(vcs, target, &name).await {
            Ok(branch) => branches.push(branch),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(branch = %name, error = %e, "Skipping branch with unreadable metrics"),
        }
    }

    info!(count = branches.len(), prefix = %config.branch_prefix, "Discovered candidate branches");
    Ok(DiscoveryOutcome::Found(branches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{ChangeKind, FileChange};
    use crate::triage::testing::{FakeBranch, FakeVcs};

    fn changes(paths: &[&str]) -> Vec<FileChange> {
        paths
            .iter()
            .map(|p| FileChange::new(*p, ChangeKind::Modified))
            .collect()
    }

    #[tokio::test]
    async fn test_discover_filters_by_prefix_and_orders() {
        let vcs = FakeVcs::new("main")
            .with_branch("claude/b", FakeBranch::new(2, changes(&["b.rs"])).behind(4))
            .with_branch("claude/a", FakeBranch::new(1, changes(&["a.rs"])))
            .with_branch("feature/other", FakeBranch::new(1, vec![]));

        let outcome = discover(&vcs, &RepoConfig::default(), "main").await.unwrap();
        let branches = outcome.branches();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].name, "claude/a");
        assert_eq!(branches[1].name, "claude/b");
        assert_eq!(branches[1].commits_ahead, 2);
        assert_eq!(branches[1].commits_behind, 4);
        assert!(branches[1].changed_files.contains("b.rs"));
    }

    #[tokio::test]
    async fn test_discover_is_bounded() {
        let mut vcs = FakeVcs::new("main");
        for i in 0..5 {
            vcs = vcs.with_branch(&format!("claude/{}", i), FakeBranch::new(1, vec![]));
        }
        let config = RepoConfig {
            max_branches: 3,
            ..Default::default()
        };

        let outcome = discover(&vcs, &config, "main").await.unwrap();
        assert_eq!(outcome.branches().len(), 3);
    }

    #[tokio::test]
    async fn test_listing_failure_is_distinct_from_empty() {
        let vcs = FakeVcs::new("main").failing_listing("remote hung up");
        let outcome = discover(&vcs, &RepoConfig::default(), "main").await.unwrap();
        assert!(matches!(outcome, DiscoveryOutcome::Failed(ref r) if r.contains("remote hung up")));

        let vcs = FakeVcs::new("main");
        let outcome = discover(&vcs, &RepoConfig::default(), "main").await.unwrap();
        assert!(matches!(outcome, DiscoveryOutcome::Found(ref b) if b.is_empty()));
    }

    #[tokio::test]
    async fn test_target_is_never_a_candidate() {
        let vcs = FakeVcs::new("claude/main")
            .with_branch("claude/main", FakeBranch::new(0, vec![]))
            .with_branch("claude/x", FakeBranch::new(1, vec![]));

        let outcome = discover(&vcs, &RepoConfig::default(), "claude/main")
            .await
            .unwrap();
        let names: Vec<_> = outcome.branches().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["claude/x"]);
    }
}
