//! Types exchanged with the classification service.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::selector::QueryStrategy;

/// How a candidate was matched by the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Matched on a standard identifier (ISBN, ISSN, work id).
    Identifier,
    /// Matched by free-text search on author and title.
    Heuristic,
}

impl MatchType {
    /// Rank used when ordering candidates. Lower ranks first.
    pub fn rank(&self) -> u8 {
        match self {
            MatchType::Identifier => 0,
            MatchType::Heuristic => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Identifier => "identifier",
            MatchType::Heuristic => "heuristic",
        }
    }
}

/// One classification result returned by the service for a single query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Dewey Decimal classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddc: Option<String>,
    /// Library of Congress classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcc: Option<String>,
    /// Service-defined relevance score. Higher is better.
    pub score: f64,
    /// How the candidate was matched.
    pub match_type: MatchType,
    /// Service work reference, used to fetch classification details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_id: Option<String>,
    /// Work title as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Work author as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Candidate {
    /// Create a candidate with the given codes and score.
    pub fn new(
        ddc: Option<&str>,
        lcc: Option<&str>,
        score: f64,
        match_type: MatchType,
    ) -> Self {
        Self {
            ddc: ddc.map(str::to_string),
            lcc: lcc.map(str::to_string),
            score,
            match_type,
            work_id: None,
            title: None,
            author: None,
        }
    }

    pub fn with_work_id(mut self, work_id: impl Into<String>) -> Self {
        self.work_id = Some(work_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Whether the candidate carries any classification code.
    pub fn is_classified(&self) -> bool {
        self.ddc.is_some() || self.lcc.is_some()
    }

    /// Whether the candidate only references a work and needs a detail lookup.
    pub fn needs_detail(&self) -> bool {
        !self.is_classified() && self.work_id.is_some()
    }

    /// Whether two candidates carry the same classification codes.
    pub fn same_codes(&self, other: &Candidate) -> bool {
        self.ddc == other.ddc && self.lcc == other.lcc
    }

    /// Trim codes and drop blank ones.
    pub fn normalized(mut self) -> Self {
        self.ddc = non_blank(self.ddc.take());
        self.lcc = non_blank(self.lcc.take());
        if !self.score.is_finite() {
            self.score = 0.0;
        }
        self
    }

    /// Total ranking order: best candidate first.
    ///
    /// Identifier matches outrank heuristic ones, then higher scores win.
    /// Ties prefer a candidate with a DDC over an LCC-only one, then the
    /// shorter (less specific) DDC, then fall back to comparing every field
    /// so the order never depends on input order.
    pub fn rank_cmp(&self, other: &Candidate) -> Ordering {
        self.match_type
            .rank()
            .cmp(&other.match_type.rank())
            .then_with(|| other.score.total_cmp(&self.score))
            .then_with(|| other.ddc.is_some().cmp(&self.ddc.is_some()))
            .then_with(|| ddc_len(self).cmp(&ddc_len(other)))
            .then_with(|| self.ddc.cmp(&other.ddc))
            .then_with(|| self.lcc.cmp(&other.lcc))
            .then_with(|| self.work_id.cmp(&other.work_id))
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| self.author.cmp(&other.author))
    }
}

fn ddc_len(candidate: &Candidate) -> usize {
    candidate.ddc.as_deref().map(str::len).unwrap_or(0)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A concrete query sent to the classification service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupQuery {
    Isbn(String),
    Issn(String),
    AuthorTitle { author: String, title: String },
    /// Detail lookup for a work referenced by an earlier response.
    Work(String),
}

impl LookupQuery {
    /// Strategy that produced this query, if any.
    pub fn strategy(&self) -> Option<QueryStrategy> {
        match self {
            LookupQuery::Isbn(_) => Some(QueryStrategy::Isbn),
            LookupQuery::Issn(_) => Some(QueryStrategy::Issn),
            LookupQuery::AuthorTitle { .. } => Some(QueryStrategy::AuthorTitle),
            LookupQuery::Work(_) => None,
        }
    }

    /// Match type the service assigns to results of this query.
    pub fn match_type(&self) -> MatchType {
        match self {
            LookupQuery::AuthorTitle { .. } => MatchType::Heuristic,
            _ => MatchType::Identifier,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupQuery::Isbn(_) => "isbn",
            LookupQuery::Issn(_) => "issn",
            LookupQuery::AuthorTitle { .. } => "author_title",
            LookupQuery::Work(_) => "work",
        }
    }
}

impl fmt::Display for LookupQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupQuery::Isbn(isbn) => write!(f, "isbn={}", isbn),
            LookupQuery::Issn(issn) => write!(f, "issn={}", issn),
            LookupQuery::AuthorTitle { author, title } => {
                write!(f, "author=\"{}\" title=\"{}\"", author, title)
            }
            LookupQuery::Work(wi) => write!(f, "wi={}", wi),
        }
    }
}
