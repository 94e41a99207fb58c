//! Branch triage engine
//!
//! Discovers candidate branches, scores them, decides their fate, carries
//! the decisions out, and consolidates whatever overlaps afterwards.

pub mod branch;
pub mod consolidate;
pub mod decision;
pub mod discovery;
pub mod executor;
pub mod issues;
pub mod readiness;
pub mod report;
pub mod run;
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;

pub use branch::{Branch, BranchEvaluation};
pub use consolidate::{
    ConsolidationOutcome, ConsolidationRecord, Consolidator, FoldResult, OverlapPair,
    SCRATCH_BRANCH,
};
pub use decision::{decide, Action, Decision, DecisionRule, ScoreSnapshot};
pub use discovery::{discover, load_branch, DiscoveryOutcome};
pub use executor::{merge_message, BranchOutcome, ExecutionReport, Executor};
pub use issues::{extract_issue_numbers, resolve_issue_refs, Provenance, ResolvedIssueRef};
pub use readiness::{
    evaluate_readiness, Freshness, FreshnessProbe, MergeProbe, QualityProbe, ReadinessReport,
    TestCoverageProbe, READINESS_CEILING,
};
pub use report::{
    prioritize, BranchRecord, RemainingBranch, RemainingPriority, RunReport, RunSummary,
};
pub use run::{RunOptions, Triage, TriagePhase};
pub use vision::{score_vision, ChangeCategory, VisionScore, VISION_MAX, VISION_MIN};
