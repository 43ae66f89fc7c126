//! Error taxonomy for scan execution.
//!
//! The propagation policy is layered: item-level errors (`ItemRead`,
//! `ClassificationTimeout`) never escalate to phase failure; they are
//! recorded as diagnostics and the phase continues. Phase-level errors
//! (`SourceUnreachable`, `Persistence`) abort the run, and only
//! `Persistence` indicates the stored results may be incomplete.

use sentra_core::TargetId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The target's source cannot be reached; the run fails without
    /// touching any persisted state and is retried at the next schedule.
    #[error("source unreachable for target {target_id}: {reason}")]
    SourceUnreachable { target_id: TargetId, reason: String },

    /// One item (file, table, row batch) could not be read. Skip and continue.
    #[error("failed to read item '{item}': {reason}")]
    ItemRead { item: String, reason: String },

    /// Classification of one item exceeded its time budget. Skip and continue.
    #[error("classification timed out for item '{item}' after {timeout_secs}s")]
    ClassificationTimeout { item: String, timeout_secs: u64 },

    /// Result integrity cannot be guaranteed; the run aborts.
    #[error("persistence error: {0}")]
    Persistence(#[from] sentra_db::DatabaseError),

    /// Rule loading failed outright (individual bad rules are skipped
    /// during compilation instead).
    #[error("rule error: {0}")]
    Rules(#[from] sentra_rules::RuleError),

    /// The run was cancelled before completing.
    #[error("run cancelled for target {target_id}")]
    Cancelled { target_id: TargetId },

    /// Target configuration is unusable (bad id, missing fields).
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl ScanError {
    /// Whether this error is isolated to a single item.
    #[must_use]
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Self::ItemRead { .. } | Self::ClassificationTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
