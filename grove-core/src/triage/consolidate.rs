//! Consolidation of overlapping branches
//!
//! Branches left after execution that touch the same files are folded
//! together so the overlap is resolved once instead of on every merge. The
//! branch further ahead survives; the other is merged into it and deleted.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::branch::Branch;
use super::discovery::load_branch;
use crate::git::{MergeOutcome, Vcs};
use crate::Result;

/// Local branch used to build a fold before it is published
pub const SCRATCH_BRANCH: &str = "grove/consolidation";

/// Two branches whose changed files intersect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapPair {
    /// Branch that survives
    pub primary: String,
    /// Branch folded into the primary
    pub secondary: String,
    /// Paths changed on both
    pub shared_file_count: usize,
}

impl OverlapPair {
    /// Order two overlapping branches; ties keep the earlier one as primary
    pub fn between(earlier: &Branch, later: &Branch) -> Option<Self> {
        let shared_file_count = earlier.shared_files(later).count();
        if shared_file_count == 0 {
            return None;
        }

        let (primary, secondary) = if later.commits_ahead > earlier.commits_ahead {
            (later, earlier)
        } else {
            (earlier, later)
        };

        Some(Self {
            primary: primary.name.clone(),
            secondary: secondary.name.clone(),
            shared_file_count,
        })
    }
}

/// What happened to a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FoldResult {
    /// Secondary merged into primary and deleted
    Folded,
    /// Dry-run: would have been folded
    Proposed,
    /// Fold abandoned; both branches untouched
    Failed { reason: String },
}

impl FoldResult {
    /// Whether the secondary no longer counts as a separate branch
    pub fn consumed(&self) -> bool {
        matches!(self, FoldResult::Folded | FoldResult::Proposed)
    }
}

/// One consolidation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidationRecord {
    pub pair: OverlapPair,
    pub result: FoldResult,
}

/// Branches left standing and what was done to get there
#[derive(Debug, Clone, Default)]
pub struct ConsolidationOutcome {
    /// Remaining branches, in input order, with updated metrics
    pub survivors: Vec<Branch>,
    /// Every overlapping pair considered
    pub records: Vec<ConsolidationRecord>,
}

impl ConsolidationOutcome {
    /// Branch that absorbed `name`, if any
    pub fn absorbed_into(&self, name: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.pair.secondary == name && r.result.consumed())
            .map(|r| r.pair.primary.as_str())
    }
}

/// Pairwise overlap analysis and folding
pub struct Consolidator<'a> {
    vcs: &'a dyn Vcs,
    target: &'a str,
    dry_run: bool,
}

impl<'a> Consolidator<'a> {
    pub fn new(vcs: &'a dyn Vcs, target: &'a str, dry_run: bool) -> Self {
        Self {
            vcs,
            target,
            dry_run,
        }
    }

    /// Fold overlapping branches together
    ///
    /// Pairs are visited in input order. A consumed branch leaves the
    /// candidate set at once, and a primary carries the secondary's files
    /// into later comparisons.
    pub async fn consolidate(&self, branches: Vec<Branch>) -> Result<ConsolidationOutcome> {
        let mut slots: Vec<Option<Branch>> = branches.into_iter().map(Some).collect();
        let mut records = Vec::new();

        for i in 0..slots.len() {
            for j in (i + 1)..slots.len() {
                let (Some(earlier), Some(later)) = (&slots[i], &slots[j]) else {
                    continue;
                };
                let Some(pair) = OverlapPair::between(earlier, later) else {
                    continue;
                };
                let (primary_idx, secondary_idx) = if pair.primary == later.name {
                    (j, i)
                } else {
                    (i, j)
                };

                info!(
                    primary = %pair.primary,
                    secondary = %pair.secondary,
                    shared = pair.shared_file_count,
                    "Overlapping branches"
                );

                let result = if self.dry_run {
                    info!(
                        primary = %pair.primary,
                        secondary = %pair.secondary,
                        "[dry-run] Would consolidate"
                    );
                    FoldResult::Proposed
                } else {
                    self.fold(&pair).await?
                };

                if result.consumed() {
                    if let Some(secondary) = slots[secondary_idx].take() {
                        let primary = slots[primary_idx].as_ref();
                        let updated = self.refresh_primary(primary, &secondary).await?;
                        slots[primary_idx] = updated;
                    }
                }

                records.push(ConsolidationRecord { pair, result });
            }
        }

        Ok(ConsolidationOutcome {
            survivors: slots.into_iter().flatten().collect(),
            records,
        })
    }

    /// Merge the secondary into the primary through a scratch branch
    ///
    /// Nothing on the remote changes unless the force-update succeeds.
    async fn fold(&self, pair: &OverlapPair) -> Result<FoldResult> {
        let result = self.publish_fold(pair).await;
        self.cleanup_scratch().await?;

        let result = match result {
            Ok(result) => result,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => FoldResult::Failed {
                reason: e.to_string(),
            },
        };

        match &result {
            FoldResult::Failed { reason } => {
                warn!(
                    primary = %pair.primary,
                    secondary = %pair.secondary,
                    reason = %reason,
                    "Consolidation abandoned"
                );
            }
            _ => {
                match self.vcs.delete_remote_branch(&pair.secondary).await {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(
                        branch = %pair.secondary,
                        error = %e,
                        "Absorbed branch could not be deleted"
                    ),
                }
                info!(primary = %pair.primary, secondary = %pair.secondary, "Consolidated");
            }
        }

        Ok(result)
    }

    async fn publish_fold(&self, pair: &OverlapPair) -> Result<FoldResult> {
        self.vcs.create_branch(SCRATCH_BRANCH, &pair.primary).await?;

        let message = format!(
            "Consolidate '{}' into {}\n\nShared files: {}\n",
            pair.secondary, pair.primary, pair.shared_file_count
        );
        let failure = match self.vcs.merge(&pair.secondary, &message).await {
            Ok(MergeOutcome::Clean) => None,
            Ok(MergeOutcome::Conflicted { detail }) => Some(format!("merge conflicts: {}", detail)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => Some(format!("merge failed: {}", e)),
        };
        if let Some(reason) = failure {
            if let Err(e) = self.vcs.abort_merge().await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(error = %e, "Merge abort failed");
            }
            return Ok(FoldResult::Failed { reason });
        }

        self.vcs.push(SCRATCH_BRANCH, &pair.primary, true).await?;
        Ok(FoldResult::Folded)
    }

    async fn cleanup_scratch(&self) -> Result<()> {
        let steps = [
            self.vcs.checkout(self.target).await,
            self.vcs.delete_local_branch(SCRATCH_BRANCH).await,
        ];
        for step in steps {
            match step {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!(error = %e, "Scratch branch cleanup incomplete"),
                Ok(()) => {}
            }
        }
        Ok(())
    }

    /// Primary metrics after absorbing `secondary`
    ///
    /// Re-read from version control after a real fold; estimated otherwise.
    async fn refresh_primary(
        &self,
        primary: Option<&Branch>,
        secondary: &Branch,
    ) -> Result<Option<Branch>> {
        let Some(primary) = primary else {
            return Ok(None);
        };

        let mut estimated = primary.clone();
        estimated.absorb(secondary);
        if self.dry_run {
            return Ok(Some(estimated));
        }

        match load_branch(self.vcs, self.target, &primary.name).await {
            Ok(reloaded) => Ok(Some(reloaded)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(
                    branch = %primary.name,
                    error = %e,
                    "Using estimated metrics after consolidation"
                );
                Ok(Some(estimated))
            }
        }
    }
}
