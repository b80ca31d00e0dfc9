//! Record and resolution types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::Candidate;
use crate::selector::QueryStrategy;

/// One catalog entry from the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier (row index or a provided key).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    /// Every original cell of the row, preserved verbatim for output.
    #[serde(default)]
    pub passthrough: Vec<String>,
}

impl Record {
    /// Create an empty record with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            author: None,
            isbn: None,
            issn: None,
            passthrough: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = present(title);
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = present(author);
        self
    }

    pub fn with_isbn(mut self, isbn: &str) -> Self {
        self.isbn = present(isbn);
        self
    }

    pub fn with_issn(mut self, issn: &str) -> Self {
        self.issn = present(issn);
        self
    }

    pub fn with_passthrough(mut self, cells: Vec<String>) -> Self {
        self.passthrough = cells;
        self
    }

    /// Whether any identifying field is populated.
    pub fn has_identifying_fields(&self) -> bool {
        self.title.is_some() || self.author.is_some() || self.isbn.is_some() || self.issn.is_some()
    }
}

/// Trimmed value, or `None` when blank.
fn present(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reasons attached to `Unresolved` and `Failed` outcomes.
pub mod reasons {
    pub const NO_USABLE_FIELDS: &str = "no usable identifying fields";
    pub const ALL_STRATEGIES_EXHAUSTED: &str = "all strategies exhausted";
    pub const CANCELLED: &str = "cancelled";
}

/// Resolution outcome for a record.
///
/// Starts as `Pending` and moves to exactly one terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resolution {
    Pending,
    Resolved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ddc: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lcc: Option<String>,
        strategy: QueryStrategy,
        candidate: Candidate,
        /// Score gap to the runner-up of the same match type, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ambiguity_margin: Option<f64>,
    },
    Ambiguous {
        strategy: QueryStrategy,
        /// Candidates in rank order, best first.
        candidates: Vec<Candidate>,
        margin: f64,
    },
    Unresolved {
        reason: String,
    },
    Failed {
        error: String,
    },
}

/// Attempted to move a resolution out of a terminal state.
#[derive(Debug, Error, PartialEq)]
#[error("invalid resolution transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

impl Resolution {
    /// Build a resolved outcome from the chosen candidate.
    pub fn resolved(strategy: QueryStrategy, candidate: Candidate, margin: Option<f64>) -> Self {
        Resolution::Resolved {
            ddc: candidate.ddc.clone(),
            lcc: candidate.lcc.clone(),
            strategy,
            candidate,
            ambiguity_margin: margin,
        }
    }

    pub fn unresolved(reason: impl Into<String>) -> Self {
        Resolution::Unresolved {
            reason: reason.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Resolution::Failed {
            error: error.into(),
        }
    }

    /// State name as written to the output table.
    pub fn state_name(&self) -> &'static str {
        match self {
            Resolution::Pending => "Pending",
            Resolution::Resolved { .. } => "Resolved",
            Resolution::Ambiguous { .. } => "Ambiguous",
            Resolution::Unresolved { .. } => "Unresolved",
            Resolution::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Resolution::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    /// Move to `next`. Only `Pending` may change, and only to a terminal state.
    pub fn transition(&mut self, next: Resolution) -> Result<(), TransitionError> {
        if self.is_terminal() || !next.is_terminal() {
            return Err(TransitionError {
                from: self.state_name(),
                to: next.state_name(),
            });
        }
        *self = next;
        Ok(())
    }

    /// Strategy that produced this outcome.
    pub fn strategy(&self) -> Option<QueryStrategy> {
        match self {
            Resolution::Resolved { strategy, .. } | Resolution::Ambiguous { strategy, .. } => {
                Some(*strategy)
            }
            _ => None,
        }
    }

    pub fn ddc(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { ddc, .. } => ddc.as_deref(),
            _ => None,
        }
    }

    pub fn lcc(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { lcc, .. } => lcc.as_deref(),
            _ => None,
        }
    }

    /// Human-readable note for the output table. Empty when resolved.
    pub fn note(&self) -> String {
        match self {
            Resolution::Pending => "not processed".to_string(),
            Resolution::Resolved { .. } => String::new(),
            Resolution::Ambiguous {
                candidates, margin, ..
            } => {
                let options: Vec<String> = candidates
                    .iter()
                    .take(3)
                    .map(|c| {
                        format!(
                            "{}/{}",
                            c.ddc.as_deref().unwrap_or("-"),
                            c.lcc.as_deref().unwrap_or("-")
                        )
                    })
                    .collect();
                format!(
                    "{} candidates within margin {:.3}: {}",
                    candidates.len(),
                    margin,
                    options.join("; ")
                )
            }
            Resolution::Unresolved { reason } => reason.clone(),
            Resolution::Failed { error } => error.clone(),
        }
    }
}
