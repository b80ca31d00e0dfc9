//! Field selection: which lookups to try for a record, and in which order.

mod identifiers;

pub use identifiers::{normalize_isbn, normalize_issn};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::LookupQuery;
use crate::record::Record;

/// A way of querying the classification service for a record.
///
/// Variants are declared in priority order, so the derived `Ord` sorts the
/// most reliable strategy first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    Isbn,
    Issn,
    AuthorTitle,
}

impl QueryStrategy {
    /// All strategies, highest priority first.
    pub const ALL: [QueryStrategy; 3] = [
        QueryStrategy::Isbn,
        QueryStrategy::Issn,
        QueryStrategy::AuthorTitle,
    ];

    /// Whether the strategy looks up a standard identifier.
    pub fn is_identifier(&self) -> bool {
        !matches!(self, QueryStrategy::AuthorTitle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStrategy::Isbn => "ISBN",
            QueryStrategy::Issn => "ISSN",
            QueryStrategy::AuthorTitle => "AUTHOR_TITLE",
        }
    }

    /// Build the service query for a record, if its fields allow it.
    pub fn query_for(&self, record: &Record) -> Option<LookupQuery> {
        match self {
            QueryStrategy::Isbn => record
                .isbn
                .as_deref()
                .and_then(normalize_isbn)
                .map(LookupQuery::Isbn),
            QueryStrategy::Issn => record
                .issn
                .as_deref()
                .and_then(normalize_issn)
                .map(LookupQuery::Issn),
            QueryStrategy::AuthorTitle => match (&record.author, &record.title) {
                (Some(author), Some(title)) => Some(LookupQuery::AuthorTitle {
                    author: author.clone(),
                    title: title.clone(),
                }),
                _ => None,
            },
        }
    }
}

impl fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategies usable for a record, highest priority first.
///
/// Only strategies whose fields are present and reliable are included.
/// An empty list means the record cannot be looked up at all.
pub fn select_strategies(record: &Record) -> Vec<QueryStrategy> {
    QueryStrategy::ALL
        .into_iter()
        .filter(|strategy| strategy.query_for(record).is_some())
        .collect()
}

/// Lazily pair each usable strategy with its query.
pub fn strategy_queue(record: &Record) -> impl Iterator<Item = (QueryStrategy, LookupQuery)> + '_ {
    QueryStrategy::ALL
        .into_iter()
        .filter_map(move |strategy| strategy.query_for(record).map(|q| (strategy, q)))
}
