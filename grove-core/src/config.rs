//! Configuration management for Grove
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GROVE_*)
//! 3. Config file (~/.config/grove/config.toml)
//! 4. Default values
//!
//! Every scoring weight and decision threshold lives here so rule precedence
//! can be exercised with different numbers without recompiling.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Repository and discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Integration branch candidates are merged into (None = detect main/master)
    pub target_branch: Option<String>,

    /// Remote the candidate branches live on
    pub remote: String,

    /// Naming convention for candidate branches
    pub branch_prefix: String,

    /// Upper bound on branches evaluated per run
    pub max_branches: usize,

    /// Timeout applied to every git subprocess
    #[serde(with = "humantime_serde")]
    pub git_timeout: Duration,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            target_branch: None,
            remote: "origin".to_string(),
            branch_prefix: "claude/".to_string(),
            max_branches: 20,
            git_timeout: Duration::from_secs(120),
        }
    }
}

/// Decision thresholds
///
/// The rule order that consumes these is fixed; only the numbers move.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Combined score for the small-scope merge rule
    pub excellent_total: u32,
    /// Maximum commits ahead for the small-scope merge rule
    pub excellent_max_commits: u32,
    /// Combined score for the recent-activity merge rule
    pub recent_total: u32,
    /// Maximum branch age for the recent-activity merge rule
    pub recent_max_age_hours: i64,
    /// Combined score required in aggressive mode
    pub aggressive_total: u32,
    /// Readiness issues tolerated in aggressive mode
    pub aggressive_max_issues: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            excellent_total: 15,
            excellent_max_commits: 5,
            recent_total: 12,
            recent_max_age_hours: 24,
            aggressive_total: 10,
            aggressive_max_issues: 1,
        }
    }
}

/// Readiness probe weights and thresholds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Points for a clean trial merge
    pub merge_points: u32,
    /// Points for passing the code-quality probe
    pub quality_points: u32,
    /// Points for adequate test coverage
    pub test_points: u32,
    /// Points for a branch that is not behind target
    pub current_points: u32,
    /// Points for a branch slightly behind target
    pub behind_points: u32,
    /// Commits behind target before the branch is considered stale
    pub max_commits_behind: u32,
    /// New TODO/FIXME markers tolerated
    pub max_new_todos: usize,
    /// New unwrap/expect/panic calls tolerated
    pub max_unguarded_calls: usize,
    /// Added implementation files allowed without an accompanying test
    pub max_untested_impl_files: usize,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            merge_points: 3,
            quality_points: 2,
            test_points: 1,
            current_points: 2,
            behind_points: 1,
            max_commits_behind: 10,
            max_new_todos: 5,
            max_unguarded_calls: 10,
            max_untested_impl_files: 2,
        }
    }
}

/// Vision alignment weights and category matchers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Starting score before bonuses
    pub base: i64,
    /// Bonus per verified HIGH priority issue
    pub high_issue_bonus: i64,
    /// Bonus per verified MEDIUM priority issue
    pub medium_issue_bonus: i64,
    /// Bonus per verified LOW priority issue
    pub low_issue_bonus: i64,
    /// Bonus for touching the service layer
    pub service_bonus: i64,
    /// Bonus for touching UI components
    pub ui_bonus: i64,
    /// Bonus for domain-integration keywords
    pub domain_bonus: i64,
    /// Bonus for styling changes
    pub styling_bonus: i64,
    /// Bonus for build configuration changes
    pub build_bonus: i64,
    /// Penalty for build configuration changes on a large branch
    pub build_penalty: i64,
    /// Commits ahead above which the build penalty applies
    pub build_penalty_commits: u32,
    /// Path fragments identifying the service layer
    pub service_patterns: Vec<String>,
    /// Path fragments identifying UI components
    pub ui_patterns: Vec<String>,
    /// Keywords identifying domain integration work
    pub domain_keywords: Vec<String>,
    /// Path fragments identifying styling
    pub styling_patterns: Vec<String>,
    /// File names identifying build configuration
    pub build_patterns: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base: 5,
            high_issue_bonus: 3,
            medium_issue_bonus: 2,
            low_issue_bonus: 1,
            service_bonus: 2,
            ui_bonus: 1,
            domain_bonus: 2,
            styling_bonus: 1,
            build_bonus: 1,
            build_penalty: 1,
            build_penalty_commits: 10,
            service_patterns: strings(&["services/", "service/", "_service."]),
            ui_patterns: strings(&["components/", "ui/", "views/", "pages/"]),
            domain_keywords: strings(&["arweave", "wallet", "upload", "archive", "storage"]),
            styling_patterns: strings(&[".css", ".scss", ".sass", "styles/", "tailwind"]),
            build_patterns: strings(&[
                "Cargo.toml",
                "Cargo.lock",
                "build.rs",
                "package.json",
                "Dioxus.toml",
                "tailwind.config.js",
                "Makefile",
            ]),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Repository settings
    pub repo: RepoConfig,
    /// Decision thresholds
    pub policy: PolicyConfig,
    /// Readiness probe settings
    pub readiness: ReadinessConfig,
    /// Vision scoring settings
    pub vision: VisionConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/grove/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("grove").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GROVE_TARGET_BRANCH: Integration branch
    /// - GROVE_REMOTE: Remote name
    /// - GROVE_BRANCH_PREFIX: Candidate branch prefix
    /// - GROVE_MAX_BRANCHES: Upper bound on evaluated branches
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(target) = std::env::var("GROVE_TARGET_BRANCH") {
            self.repo.target_branch = Some(target);
        }

        if let Ok(remote) = std::env::var("GROVE_REMOTE") {
            self.repo.remote = remote;
        }

        if let Ok(prefix) = std::env::var("GROVE_BRANCH_PREFIX") {
            self.repo.branch_prefix = prefix;
        }

        if let Ok(max) = std::env::var("GROVE_MAX_BRANCHES") {
            self.repo.max_branches = max.parse().map_err(|_| {
                Error::Config(format!("GROVE_MAX_BRANCHES must be a number, got '{}'", max))
            })?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        target_branch: Option<String>,
        branch_prefix: Option<String>,
        max_branches: Option<usize>,
    ) -> Self {
        if let Some(target) = target_branch {
            self.repo.target_branch = Some(target);
        }

        if let Some(prefix) = branch_prefix {
            self.repo.branch_prefix = prefix;
        }

        if let Some(max) = max_branches {
            self.repo.max_branches = max;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        target_branch: Option<String>,
        branch_prefix: Option<String>,
        max_branches: Option<usize>,
    ) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(target_branch, branch_prefix, max_branches);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.repo.branch_prefix.is_empty() {
            return Err(Error::Config(
                "branch_prefix must not be empty; it would select every branch".to_string(),
            ));
        }
        if self.repo.max_branches == 0 {
            return Err(Error::Config("max_branches must be at least 1".to_string()));
        }
        if self.repo.git_timeout.is_zero() {
            return Err(Error::Config("git_timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repo.remote, "origin");
        assert_eq!(config.repo.branch_prefix, "claude/");
        assert!(config.repo.target_branch.is_none());
        assert_eq!(config.policy.excellent_total, 15);
        assert_eq!(config.policy.recent_total, 12);
        assert_eq!(config.policy.aggressive_total, 10);
        assert_eq!(config.vision.base, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(
            Some("develop".to_string()),
            Some("agent/".to_string()),
            Some(5),
        );

        assert_eq!(config.repo.target_branch, Some("develop".to_string()));
        assert_eq!(config.repo.branch_prefix, "agent/");
        assert_eq!(config.repo.max_branches, 5);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[repo]
target_branch = "develop"
git_timeout = "45s"

[policy]
excellent_total = 16
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.repo.target_branch, Some("develop".to_string()));
        assert_eq!(config.repo.git_timeout, Duration::from_secs(45));
        assert_eq!(config.policy.excellent_total, 16);
        // untouched fields keep their defaults
        assert_eq!(config.policy.recent_total, 12);
        assert_eq!(config.readiness.merge_points, 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[vision]\ndomain_keywords = [\"ledger\"]").unwrap();

        let config = Config::load_from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.vision.domain_keywords, vec!["ledger".to_string()]);
        assert_eq!(config.vision.service_bonus, 2);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[repo\nbroken").unwrap();

        let err = Config::load_from_file(&file.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let config = Config::default().with_cli_overrides(None, Some(String::new()), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_branches() {
        let config = Config::default().with_cli_overrides(None, None, Some(0));
        assert!(config.validate().is_err());
    }
}
