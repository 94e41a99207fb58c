//! Grove Core - Core library for autonomous branch lifecycle management
//!
//! This crate provides branch discovery, readiness and alignment scoring,
//! the merge decision policy, and the executor and consolidation passes
//! that act on those decisions.

pub mod config;
pub mod error;
pub mod git;
pub mod secrets;
pub mod tracker;
pub mod triage;

pub use config::{Config, PolicyConfig, ReadinessConfig, RepoConfig, VisionConfig};
pub use error::{Error, Result};
pub use git::{GitCli, GitRepo, Vcs};
pub use secrets::Secrets;
pub use tracker::{IssuePriority, IssueSnapshot, IssueTracker, TrackedIssue};
pub use triage::{RunOptions, RunReport, Triage};
