//! Delimited table input and output.
//!
//! Records are read from CSV-like files with a configurable column mapping.
//! Results are written back as the original rows plus appended result
//! columns. Large inputs can be split into batch files and joined again.

mod batch;
mod config;
mod io;

pub use batch::{batch_path, join_tables, split_table, DEFAULT_BATCH_SIZE};
pub use config::{ColumnMapping, ColumnRef, TableConfig};
pub use io::{read_records, read_table, write_results, write_table, InputTable, OUTPUT_COLUMNS};

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading, writing, splitting or joining tables.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("column {column} for field '{field}' not found")]
    MissingColumn { field: &'static str, column: String },

    #[error("no identifying columns found (expected isbn, issn, author or title)")]
    NoIdentifyingColumns,

    #[error("empty record id in data row {0}")]
    EmptyId(usize),

    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    #[error("{records} records but {resolutions} resolutions")]
    LengthMismatch { records: usize, resolutions: usize },

    #[error("delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(String),

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("no input tables given")]
    NoInputs,
}
