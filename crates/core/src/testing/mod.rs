//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable classification service and fixtures,
//! allowing batch runs to be tested without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use subjectify_core::testing::{fixtures, MockClassificationService};
//!
//! let service = Arc::new(MockClassificationService::new());
//! service.set_response(fixtures::isbn_query("9780140449266"), vec![
//!     fixtures::identifier_candidate("823.8", "PR4588"),
//! ]).await;
//!
//! let client = LookupClient::new(service.clone(), &fixtures::fast_lookup_config());
//! ```

mod mock_classify;

pub use mock_classify::{ErrorFactory, MockClassificationService, RecordedQuery};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::classify::{Candidate, LookupQuery, MatchType};
    use crate::lookup::LookupConfig;
    use crate::record::Record;

    /// Lookup settings without throttling and with millisecond backoff.
    pub fn fast_lookup_config() -> LookupConfig {
        LookupConfig {
            timeout_ms: 1_000,
            rate_limit_interval_ms: 0,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Default::default()
        }
    }

    /// A record identified only by ISBN.
    pub fn isbn_record(id: &str, isbn: &str) -> Record {
        Record::new(id).with_isbn(isbn)
    }

    /// A record with author and title but no identifiers.
    pub fn author_title_record(id: &str, author: &str, title: &str) -> Record {
        Record::new(id).with_author(author).with_title(title)
    }

    /// A record without any identifying field.
    pub fn empty_record(id: &str) -> Record {
        Record::new(id).with_passthrough(vec![String::new(); 4])
    }

    pub fn isbn_query(isbn: &str) -> LookupQuery {
        LookupQuery::Isbn(isbn.to_string())
    }

    pub fn author_title_query(author: &str, title: &str) -> LookupQuery {
        LookupQuery::AuthorTitle {
            author: author.to_string(),
            title: title.to_string(),
        }
    }

    /// An identifier match carrying both codes.
    pub fn identifier_candidate(ddc: &str, lcc: &str) -> Candidate {
        Candidate::new(Some(ddc), Some(lcc), 1.0, MatchType::Identifier)
    }

    /// A heuristic match with a DDC and the given score.
    pub fn heuristic_candidate(ddc: &str, score: f64) -> Candidate {
        Candidate::new(Some(ddc), None, score, MatchType::Heuristic)
    }

    /// Three close heuristic candidates for a well-known ambiguous title.
    pub fn dickens_candidates() -> Vec<Candidate> {
        vec![
            heuristic_candidate("823.8", 0.34).with_title("Great Expectations"),
            heuristic_candidate("823.912", 0.33).with_title("Great Expectations (play)"),
            heuristic_candidate("813.54", 0.33).with_title("Great Expectations (novel)"),
        ]
    }
}
