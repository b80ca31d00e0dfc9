//! Batch orchestrator.
//!
//! Drives records through the pipeline:
//! - **Selection**: usable strategies per record, highest priority first
//! - **Lookup**: shared, throttled client; records run concurrently up to `workers`
//! - **Resolution**: first `Resolved` strategy wins, output kept in input order

mod config;
mod journal;
mod runner;
mod types;

pub use config::BatchConfig;
pub use journal::{load_journal, JournalEntry, JournalError, ResolutionJournal};
pub use runner::BatchOrchestrator;
pub use types::{BatchError, BatchReport, BatchSummary};
