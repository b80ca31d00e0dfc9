//! Candidate resolver.
//!
//! Ranks the candidates a lookup produced and decides whether one of them
//! is a clear winner, or whether the record is ambiguous.

mod config;
mod resolve;

pub use config::ResolverConfig;
pub use resolve::{rank_candidates, CandidateResolver, StrategyOutcome, MARGIN_TOLERANCE};
