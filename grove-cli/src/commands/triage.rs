//! Triage command - evaluate and act on candidate branches

use std::path::PathBuf;

use clap::Args;
use grove_core::triage::{BranchOutcome, FoldResult, RunReport};
use grove_core::{Config, GitCli, GitRepo, IssueTracker, RunOptions, Triage};
use grove_github::{parse_github_url, GitHubClient};
use tracing::{info, warn};

/// Evaluate candidate branches and merge, delete or consolidate them
#[derive(Args, Debug)]
pub struct TriageArgs {
    /// Decide and report without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Merge branches with acceptable scores and at most one issue
    #[arg(long)]
    pub aggressive: bool,

    /// Integration branch (default: configured, then origin's main/master)
    #[arg(long)]
    pub target_branch: Option<String>,

    /// Only consider branches starting with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Maximum number of branches to evaluate
    #[arg(long)]
    pub max_branches: Option<usize>,

    /// Repository to triage
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// GitHub repository for issues (owner/repo; default: inferred from the remote)
    #[arg(long)]
    pub github: Option<String>,

    /// Run without an issue tracker
    #[arg(long, conflicts_with = "github")]
    pub no_tracker: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl TriageArgs {
    /// Execute the triage command
    pub async fn execute(&self, verbose: bool) -> anyhow::Result<()> {
        let config = Config::load_with_overrides(
            self.target_branch.clone(),
            self.prefix.clone(),
            self.max_branches,
        )?;

        let repo = GitRepo::open(&self.repo)?;
        let target = config
            .repo
            .target_branch
            .clone()
            .unwrap_or_else(|| repo.default_branch(&config.repo.remote));

        if verbose {
            info!(
                root = %repo.root().display(),
                target = %target,
                prefix = %config.repo.branch_prefix,
                "Configuration loaded"
            );
        }

        let vcs = GitCli::new(repo.root(), &config.repo.remote, config.repo.git_timeout);
        let tracker = self.tracker(&repo, &config)?;
        let options = RunOptions::new(target)
            .with_dry_run(self.dry_run)
            .with_aggressive(self.aggressive);

        let report = Triage::new(
            &vcs,
            tracker.as_ref().map(|t| t as &dyn IssueTracker),
            &config,
            options,
        )
        .run()
        .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, verbose);
        }

        Ok(())
    }

    /// Build the GitHub client, if any
    ///
    /// An explicit `--github` must work; an inferred one degrades to running
    /// without a tracker.
    fn tracker(&self, repo: &GitRepo, config: &Config) -> anyhow::Result<Option<GitHubClient>> {
        if self.no_tracker {
            return Ok(None);
        }

        if let Some(github) = &self.github {
            let client = GitHubClient::from_url(github).map_err(|e| anyhow::anyhow!("{}", e))?;
            return Ok(Some(client));
        }

        let inferred = repo
            .remote(&config.repo.remote)
            .map_err(|e| e.to_string())
            .and_then(|remote| parse_github_url(&remote.url).map_err(|e| e.to_string()))
            .and_then(|(owner, name)| GitHubClient::new(owner, name).map_err(|e| e.to_string()));

        match inferred {
            Ok(client) => Ok(Some(client)),
            Err(reason) => {
                warn!(reason = %reason, "Running without issue tracker");
                Ok(None)
            }
        }
    }
}

fn outcome_label(outcome: &BranchOutcome) -> String {
    match outcome {
        BranchOutcome::Merged => "merged".to_string(),
        BranchOutcome::Cleaned => "deleted".to_string(),
        BranchOutcome::Skipped => "skipped".to_string(),
        BranchOutcome::Failed { reason } => format!("failed ({})", reason),
        BranchOutcome::Absorbed { into } => format!("absorbed into {}", into),
    }
}

fn issue_list(numbers: &[u64]) -> String {
    numbers
        .iter()
        .map(|n| format!("#{}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(report: &RunReport, verbose: bool) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    let heading = format!("Grove triage into {}{}", report.target, mode);
    println!();
    println!("{}", heading);
    println!("{}", "=".repeat(heading.len()));

    if let Some(reason) = &report.discovery_failure {
        println!();
        println!("Branch discovery failed: {}", reason);
        return;
    }
    if report.branches.is_empty() {
        println!();
        println!("No candidate branches found.");
        return;
    }

    println!();
    println!("Branches:");
    for record in &report.branches {
        let evaluation = &record.evaluation;
        let scores = &evaluation.decision.scores;
        println!(
            "  {} [{}] readiness {}/9, vision {}/10 -> {}",
            record.name(),
            evaluation.decision.action,
            scores.readiness,
            scores.vision,
            outcome_label(&record.outcome)
        );
        println!("      {}", evaluation.decision.justification);
        if verbose {
            println!(
                "      {} ahead, {} behind, {} files",
                evaluation.branch.commits_ahead,
                evaluation.branch.commits_behind,
                evaluation.branch.changed_files.len()
            );
            if !evaluation.vision.categories.is_empty() {
                let categories: Vec<String> = evaluation
                    .vision
                    .categories
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                println!("      touches: {}", categories.join(", "));
            }
        }
        let unverified = evaluation.unverified_issues();
        if !unverified.is_empty() {
            println!("      references (unverified): {}", issue_list(&unverified));
        }
        if !record.resolved_issues.is_empty() {
            let verb = if report.dry_run { "would close" } else { "closed" };
            println!("      {} issues: {}", verb, issue_list(&record.resolved_issues));
        }
        if !record.close_failures.is_empty() {
            println!("      could not close issues: {}", issue_list(&record.close_failures));
        }
    }

    if !report.consolidations.is_empty() {
        println!();
        println!("Consolidation:");
        for c in &report.consolidations {
            let status = match &c.result {
                FoldResult::Folded => "folded".to_string(),
                FoldResult::Proposed => "proposed".to_string(),
                FoldResult::Failed { reason } => format!("failed ({})", reason),
            };
            println!(
                "  {} -> {} ({} shared files): {}",
                c.pair.secondary, c.pair.primary, c.pair.shared_file_count, status
            );
        }
    }

    if !report.remaining.is_empty() {
        println!();
        println!("Remaining branches:");
        for remaining in &report.remaining {
            println!(
                "  [{}] {} (total {}): {}",
                remaining.priority, remaining.name, remaining.total, remaining.rationale
            );
        }
    }

    let summary = &report.summary;
    println!();
    println!("Summary:");
    println!("  evaluated:   {}", summary.discovered);
    println!(
        "  merged:      {} ({} merged, {} deleted)",
        summary.merged_count(),
        summary.merged,
        summary.cleaned
    );
    println!("  skipped:     {}", summary.skipped);
    println!("  failed:      {}", summary.failed);
    println!("  absorbed:    {}", summary.absorbed);
    let failed_folds = report.failed_consolidations().count();
    if failed_folds > 0 {
        println!("  consolidations failed: {}", failed_folds);
    }
    println!("  remaining:   {}", report.remaining.len());
    println!("  issues resolved: {}", summary.issues_resolved);
    if summary.issue_close_failures > 0 {
        println!("  issue close failures: {}", summary.issue_close_failures);
    }
}
