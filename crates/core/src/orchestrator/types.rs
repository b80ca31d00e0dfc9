//! Types for the batch orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lookup::LookupError;
use crate::record::Resolution;

use super::journal::JournalError;

/// Errors that abort a whole batch.
///
/// Per-record failures never show up here; they end up in that record's
/// `Resolution`.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The startup probe failed.
    #[error("classification service unavailable: {0}")]
    ServiceUnavailable(#[source] LookupError),

    /// Two records share the same id.
    #[error("duplicate record id: {0}")]
    DuplicateRecordId(String),

    /// The resume journal could not be read or opened.
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}

/// Outcome counts for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub ambiguous: usize,
    pub unresolved: usize,
    pub failed: usize,
    /// Records whose outcome came from the resume journal.
    pub resumed: usize,
}

impl BatchSummary {
    /// Count outcomes. `resumed` is left at zero.
    pub fn from_resolutions(resolutions: &[Resolution]) -> Self {
        let mut summary = Self {
            total: resolutions.len(),
            ..Default::default()
        };
        for resolution in resolutions {
            match resolution {
                Resolution::Resolved { .. } => summary.resolved += 1,
                Resolution::Ambiguous { .. } => summary.ambiguous += 1,
                Resolution::Unresolved { .. } => summary.unresolved += 1,
                Resolution::Failed { .. } | Resolution::Pending => summary.failed += 1,
            }
        }
        summary
    }
}

/// Result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// One resolution per input record, in input order.
    pub resolutions: Vec<Resolution>,
    pub summary: BatchSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Whether the run was cancelled before every record finished.
    pub cancelled: bool,
}
