//! Git operations for Grove
//!
//! `Vcs` is the capability the triage engine is written against; `GitCli` is
//! the production implementation over a real checkout.

mod cli;
mod repo;
mod vcs;

pub use cli::GitCli;
pub use repo::{GitRepo, RemoteInfo};
pub use vcs::{ChangeKind, FileChange, MergeOutcome, Vcs};
