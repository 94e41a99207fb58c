//! Readiness evaluation
//!
//! Four probes measure independent aspects of a branch's structural health.
//! Each returns a value object that knows its own points and issues; the
//! aggregator only sums. Every probe always runs, because the decision
//! engine needs the complete issue list.

use serde::Serialize;
use tracing::{debug, warn};

use super::branch::Branch;
use crate::config::ReadinessConfig;
use crate::git::{ChangeKind, FileChange, MergeOutcome, Vcs};
use crate::Result;

/// Highest readiness score a branch can reach
pub const READINESS_CEILING: u32 = 9;

/// Markers counted as newly introduced technical debt
const DEBT_MARKERS: [&str; 4] = ["TODO", "FIXME", "XXX", "HACK"];

/// Calls that abort instead of handling failure
const UNGUARDED_CALLS: [&str; 3] = [".unwrap()", ".expect(", "panic!("];

const SOURCE_EXTENSIONS: [&str; 14] = [
    "rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "kt", "swift", "rb", "c", "cpp", "h",
];

/// Outcome of the trial merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeProbe {
    /// The trial merge applied cleanly
    pub conflict_free: bool,
    /// Why the probe could not run, if it could not
    pub error: Option<String>,
}

impl MergeProbe {
    fn points(&self, config: &ReadinessConfig) -> u32 {
        if self.conflict_free {
            config.merge_points
        } else {
            0
        }
    }

    fn issues(&self) -> Vec<String> {
        match (&self.error, self.conflict_free) {
            (Some(e), _) => vec![format!("merge check failed: {}", e)],
            (None, false) => vec!["merge conflicts".to_string()],
            (None, true) => vec![],
        }
    }
}

/// New debt markers and unguarded calls among added lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityProbe {
    /// New TODO/FIXME/XXX/HACK markers
    pub new_todos: usize,
    /// New unwrap/expect/panic calls
    pub unguarded_calls: usize,
    /// Why the probe could not run, if it could not
    pub error: Option<String>,
}

impl QualityProbe {
    fn failed(error: String) -> Self {
        Self {
            new_todos: 0,
            unguarded_calls: 0,
            error: Some(error),
        }
    }

    fn issues(&self, config: &ReadinessConfig) -> Vec<String> {
        if let Some(e) = &self.error {
            return vec![format!("quality check failed: {}", e)];
        }

        let mut issues = Vec::new();
        if self.new_todos > config.max_new_todos {
            issues.push(format!("{} new TODO/FIXME markers", self.new_todos));
        }
        if self.unguarded_calls > config.max_unguarded_calls {
            issues.push(format!(
                "{} unguarded unwrap/expect/panic calls",
                self.unguarded_calls
            ));
        }
        issues
    }

    fn points(&self, config: &ReadinessConfig) -> u32 {
        if self.issues(config).is_empty() {
            config.quality_points
        } else {
            0
        }
    }
}

/// Added implementation files versus accompanying tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCoverageProbe {
    /// Implementation files the branch adds
    pub added_impl_files: usize,
    /// Test files the branch adds or changes
    pub test_files: usize,
}

impl TestCoverageProbe {
    fn adequate(&self, config: &ReadinessConfig) -> bool {
        self.added_impl_files <= config.max_untested_impl_files || self.test_files > 0
    }

    fn points(&self, config: &ReadinessConfig) -> u32 {
        if self.adequate(config) {
            config.test_points
        } else {
            0
        }
    }

    fn issues(&self, config: &ReadinessConfig) -> Vec<String> {
        if self.adequate(config) {
            vec![]
        } else {
            vec!["missing tests".to_string()]
        }
    }
}

/// How far the branch trails the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Not behind the target
    Current,
    /// Slightly behind; informational only
    BehindAcceptable,
    /// Too far behind to merge safely
    StaleBlocking,
}

/// Freshness of the branch relative to the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreshnessProbe {
    /// Commits the branch is behind
    pub commits_behind: u32,
    /// Classification
    pub freshness: Freshness,
}

impl FreshnessProbe {
    fn points(&self, config: &ReadinessConfig) -> u32 {
        match self.freshness {
            Freshness::Current => config.current_points,
            Freshness::BehindAcceptable => config.behind_points,
            Freshness::StaleBlocking => 0,
        }
    }

    fn issues(&self) -> Vec<String> {
        match self.freshness {
            Freshness::StaleBlocking => {
                vec![format!("{} commits behind target", self.commits_behind)]
            }
            _ => vec![],
        }
    }
}

/// Trial-merge `branch` into `target`
///
/// Adapter failures become a failed probe; only fatal errors propagate.
pub async fn probe_merge(vcs: &dyn Vcs, target: &str, branch: &str) -> Result<MergeProbe> {
    match vcs.trial_merge(target, branch).await {
        Ok(MergeOutcome::Clean) => Ok(MergeProbe {
            conflict_free: true,
            error: None,
        }),
        Ok(MergeOutcome::Conflicted { detail }) => {
            debug!(branch, detail = %detail, "Trial merge conflicted");
            Ok(MergeProbe {
                conflict_free: false,
                error: None,
            })
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(branch, error = %e, "Trial merge could not run");
            Ok(MergeProbe {
                conflict_free: false,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Count debt markers and unguarded calls in added lines
pub fn probe_quality(added_lines: &[String]) -> QualityProbe {
    let new_todos = added_lines
        .iter()
        .filter(|line| DEBT_MARKERS.iter().any(|m| line.contains(m)))
        .count();

    let unguarded_calls = added_lines
        .iter()
        .map(|line| {
            UNGUARDED_CALLS
                .iter()
                .map(|call| line.matches(call).count())
                .sum::<usize>()
        })
        .sum();

    QualityProbe {
        new_todos,
        unguarded_calls,
        error: None,
    }
}

/// Whether a path looks like a test file
pub fn is_test_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);

    lower.starts_with("tests/")
        || lower.contains("/tests/")
        || lower.contains("/test/")
        || lower.contains("__tests__/")
        || file_name.starts_with("test_")
        || file_name.contains("_test.")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name == "tests.rs"
}

/// Whether a path is a source file that is not a test
pub fn is_impl_file(path: &str) -> bool {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    SOURCE_EXTENSIONS.contains(&extension) && !is_test_file(path)
}

/// Count added implementation files and changed test files
pub fn probe_test_coverage(changes: &[FileChange]) -> TestCoverageProbe {
    let added_impl_files = changes
        .iter()
        .filter(|c| c.kind == ChangeKind::Added && is_impl_file(&c.path))
        .count();
    let test_files = changes
        .iter()
        .filter(|c| c.kind != ChangeKind::Deleted && is_test_file(&c.path))
        .count();

    TestCoverageProbe {
        added_impl_files,
        test_files,
    }
}

/// Classify how far behind the target a branch is
pub fn probe_freshness(commits_behind: u32, config: &ReadinessConfig) -> FreshnessProbe {
    let freshness = match commits_behind {
        0 => Freshness::Current,
        n if n <= config.max_commits_behind => Freshness::BehindAcceptable,
        _ => Freshness::StaleBlocking,
    };

    FreshnessProbe {
        commits_behind,
        freshness,
    }
}

/// Aggregated structural health of a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// The trial merge applied cleanly
    pub merge_conflict_free: bool,
    /// Number of quality breaches
    pub quality_issue_count: usize,
    /// Tests accompany new implementation files
    pub test_coverage_adequate: bool,
    /// Freshness classification
    pub freshness: Freshness,
    /// Sum of probe points, at most `READINESS_CEILING`
    pub score: u32,
    /// Problems found, in probe order
    pub issues: Vec<String>,
}

impl ReadinessReport {
    /// Combine the four probe results
    pub fn from_probes(
        merge: &MergeProbe,
        quality: &QualityProbe,
        tests: &TestCoverageProbe,
        freshness: &FreshnessProbe,
        config: &ReadinessConfig,
    ) -> Self {
        let score = merge.points(config)
            + quality.points(config)
            + tests.points(config)
            + freshness.points(config);

        let quality_issues = quality.issues(config);
        let mut issues = merge.issues();
        issues.extend(quality_issues.iter().cloned());
        issues.extend(tests.issues(config));
        issues.extend(freshness.issues());

        Self {
            merge_conflict_free: merge.conflict_free,
            quality_issue_count: quality_issues.len(),
            test_coverage_adequate: tests.adequate(config),
            freshness: freshness.freshness,
            score: score.min(READINESS_CEILING),
            issues,
        }
    }

    /// Whether no probe reported a problem
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Run all four probes against a branch
pub async fn evaluate_readiness(
    vcs: &dyn Vcs,
    target: &str,
    branch: &Branch,
    config: &ReadinessConfig,
) -> Result<ReadinessReport> {
    let merge = probe_merge(vcs, target, &branch.name).await?;

    let quality = match vcs.added_lines(target, &branch.name).await {
        Ok(lines) => probe_quality(&lines),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(branch = %branch.name, error = %e, "Could not read branch diff");
            QualityProbe::failed(e.to_string())
        }
    };

    let tests = probe_test_coverage(&branch.changes);
    let freshness = probe_freshness(branch.commits_behind, config);

    let report = ReadinessReport::from_probes(&merge, &quality, &tests, &freshness, config);
    debug!(
        branch = %branch.name,
        score = report.score,
        issues = ?report.issues,
        "Readiness evaluated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::testing::{FakeBranch, FakeVcs};
    use chrono::Utc;

    fn clean_merge() -> MergeProbe {
        MergeProbe {
            conflict_free: true,
            error: None,
        }
    }

    fn clean_quality() -> QualityProbe {
        probe_quality(&[])
    }

    fn no_new_files() -> TestCoverageProbe {
        probe_test_coverage(&[])
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_probes_pass() {
        let config = ReadinessConfig::default();
        let report = ReadinessReport::from_probes(
            &clean_merge(),
            &clean_quality(),
            &no_new_files(),
            &probe_freshness(0, &config),
            &config,
        );
        assert_eq!(report.score, 8);
        assert!(report.is_clean());
        assert_eq!(report.freshness, Freshness::Current);
    }

    #[test]
    fn test_conflict_costs_merge_points_and_adds_issue() {
        let config = ReadinessConfig::default();
        let conflict = MergeProbe {
            conflict_free: false,
            error: None,
        };
        let report = ReadinessReport::from_probes(
            &conflict,
            &clean_quality(),
            &no_new_files(),
            &probe_freshness(0, &config),
            &config,
        );
        assert_eq!(report.score, 5);
        assert_eq!(report.issues, vec!["merge conflicts"]);
        assert!(!report.merge_conflict_free);
    }

    #[test]
    fn test_quality_breaches_are_distinct_issues() {
        let config = ReadinessConfig {
            max_new_todos: 1,
            max_unguarded_calls: 1,
            ..Default::default()
        };
        let quality = probe_quality(&lines(&[
            "// TODO: later",
            "// FIXME: broken",
            "let a = b.unwrap(); let c = d.expect(\"x\");",
        ]));
        assert_eq!(quality.new_todos, 2);
        assert_eq!(quality.unguarded_calls, 2);

        let report = ReadinessReport::from_probes(
            &clean_merge(),
            &quality,
            &no_new_files(),
            &probe_freshness(0, &config),
            &config,
        );
        assert_eq!(report.quality_issue_count, 2);
        assert_eq!(
            report.issues,
            vec![
                "2 new TODO/FIXME markers",
                "2 unguarded unwrap/expect/panic calls"
            ]
        );
        assert_eq!(report.score, 6);
    }

    #[test]
    fn test_quality_at_threshold_passes() {
        let config = ReadinessConfig::default();
        let quality = probe_quality(&lines(&["TODO"; 5]));
        assert!(quality.issues(&config).is_empty());
        assert_eq!(quality.points(&config), 2);
    }

    #[test]
    fn test_coverage_rules() {
        let config = ReadinessConfig::default();
        let added = |p: &str| FileChange::new(p, ChangeKind::Added);

        // two new implementation files need no test
        let probe = probe_test_coverage(&[added("src/a.rs"), added("src/b.rs")]);
        assert!(probe.adequate(&config));

        // three need at least one
        let untested = [added("src/a.rs"), added("src/b.rs"), added("src/c.rs")];
        let probe = probe_test_coverage(&untested);
        assert_eq!(probe.added_impl_files, 3);
        assert!(!probe.adequate(&config));
        assert_eq!(probe.issues(&config), vec!["missing tests"]);

        let mut tested = untested.to_vec();
        tested.push(FileChange::new("tests/c_test.rs", ChangeKind::Modified));
        assert!(probe_test_coverage(&tested).adequate(&config));
    }

    #[test]
    fn test_file_classification() {
        assert!(is_test_file("tests/integration.rs"));
        assert!(is_test_file("src/wallet/tests.rs"));
        assert!(is_test_file("web/src/button.test.tsx"));
        assert!(is_test_file("pkg/thing_test.go"));
        assert!(is_test_file("test_upload.py"));
        assert!(!is_test_file("src/services/arweave.rs"));

        assert!(is_impl_file("src/services/arweave.rs"));
        assert!(!is_impl_file("README.md"));
        assert!(!is_impl_file("tests/a.rs"));
        assert!(!is_impl_file("Makefile"));
    }

    #[test]
    fn test_freshness_bands() {
        let config = ReadinessConfig::default();
        assert_eq!(probe_freshness(0, &config).freshness, Freshness::Current);
        assert_eq!(
            probe_freshness(1, &config).freshness,
            Freshness::BehindAcceptable
        );
        assert_eq!(
            probe_freshness(10, &config).freshness,
            Freshness::BehindAcceptable
        );
        let stale = probe_freshness(11, &config);
        assert_eq!(stale.freshness, Freshness::StaleBlocking);
        assert_eq!(stale.issues(), vec!["11 commits behind target"]);

        // behind but acceptable is informational only
        assert!(probe_freshness(3, &config).issues().is_empty());
        assert_eq!(probe_freshness(3, &config).points(&config), 1);
    }

    #[test]
    fn test_score_is_bounded_for_every_probe_combination() {
        let config = ReadinessConfig::default();
        for conflict_free in [true, false] {
            for todos in [0usize, 50] {
                for impl_files in [0usize, 5] {
                    for behind in [0u32, 5, 50] {
                        let merge = MergeProbe {
                            conflict_free,
                            error: None,
                        };
                        let quality = QualityProbe {
                            new_todos: todos,
                            unguarded_calls: 0,
                            error: None,
                        };
                        let tests = TestCoverageProbe {
                            added_impl_files: impl_files,
                            test_files: 0,
                        };
                        let fresh = probe_freshness(behind, &config);

                        let first =
                            ReadinessReport::from_probes(&merge, &quality, &tests, &fresh, &config);
                        let second =
                            ReadinessReport::from_probes(&merge, &quality, &tests, &fresh, &config);

                        assert!(first.score <= READINESS_CEILING);
                        assert_eq!(first, second);
                        assert_eq!(
                            first.score,
                            merge.points(&config)
                                + quality.points(&config)
                                + tests.points(&config)
                                + fresh.points(&config)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_score_capped_at_ceiling_with_heavier_weights() {
        let config = ReadinessConfig {
            merge_points: 5,
            ..Default::default()
        };
        let report = ReadinessReport::from_probes(
            &clean_merge(),
            &clean_quality(),
            &no_new_files(),
            &probe_freshness(0, &config),
            &config,
        );
        assert_eq!(report.score, READINESS_CEILING);
    }

    #[tokio::test]
    async fn test_evaluate_runs_every_probe_despite_conflict() {
        let vcs = FakeVcs::new("main").with_branch(
            "claude/x",
            FakeBranch::new(3, vec![])
                .conflicting()
                .added_lines(&["a.unwrap()"; 11]),
        );
        let branch = Branch::new(
            "claude/x",
            3,
            20,
            Utc::now(),
            vec![
                FileChange::new("src/a.rs", ChangeKind::Added),
                FileChange::new("src/b.rs", ChangeKind::Added),
                FileChange::new("src/c.rs", ChangeKind::Added),
            ],
        );

        let report = evaluate_readiness(&vcs, "main", &branch, &ReadinessConfig::default())
            .await
            .unwrap();

        assert_eq!(report.score, 0);
        assert_eq!(
            report.issues,
            vec![
                "merge conflicts",
                "11 unguarded unwrap/expect/panic calls",
                "missing tests",
                "20 commits behind target"
            ]
        );
        assert_eq!(vcs.trial_merges(), vec!["claude/x"]);
    }

    #[tokio::test]
    async fn test_unreadable_diff_is_a_failed_probe() {
        // branch unknown to the fake: both trial merge and diff fail
        let vcs = FakeVcs::new("main");
        let branch = Branch::new("claude/gone", 1, 0, Utc::now(), vec![]);

        let report = evaluate_readiness(&vcs, "main", &branch, &ReadinessConfig::default())
            .await
            .unwrap();

        assert!(!report.merge_conflict_free);
        assert_eq!(report.quality_issue_count, 1);
        assert!(report.issues[0].starts_with("merge check failed"));
        assert!(report.issues[1].starts_with("quality check failed"));
        assert_eq!(report.score, 3);
    }
}
