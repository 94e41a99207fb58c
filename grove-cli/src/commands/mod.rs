//! CLI command implementations

pub mod config;
pub mod triage;

pub use config::ConfigArgs;
pub use triage::TriageArgs;
