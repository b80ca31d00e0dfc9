//! Reading records from and writing results to delimited tables.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, warn};

use crate::record::{Record, Resolution};

use super::config::{ColumnRef, Field, TableConfig};
use super::TableError;

/// Columns appended to every output row.
pub const OUTPUT_COLUMNS: [&str; 5] = ["ddc", "lcc", "resolutionState", "strategyUsed", "note"];

/// A parsed input table.
#[derive(Debug, Clone)]
pub struct InputTable {
    /// Header row, when the input has one.
    pub headers: Option<Vec<String>>,
    /// One record per data row, in file order. Each record keeps its row
    /// cells as passthrough.
    pub records: Vec<Record>,
    /// Delimiter the table was read with, reused for output.
    pub delimiter: u8,
}

#[derive(Debug, Default)]
struct ColumnIndexes {
    id: Option<usize>,
    isbn: Option<usize>,
    issn: Option<usize>,
    author: Option<usize>,
    title: Option<usize>,
}

impl ColumnIndexes {
    fn set(&mut self, field: Field, index: Option<usize>) {
        match field {
            Field::Id => self.id = index,
            Field::Isbn => self.isbn = index,
            Field::Issn => self.issn = index,
            Field::Author => self.author = index,
            Field::Title => self.title = index,
        }
    }

    fn has_identifying_column(&self) -> bool {
        self.isbn.is_some() || self.issn.is_some() || self.author.is_some() || self.title.is_some()
    }
}

fn locate(column: &ColumnRef, headers: Option<&StringRecord>) -> Option<usize> {
    match column {
        ColumnRef::Index(index) => Some(*index),
        ColumnRef::Name(name) => headers?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim())),
    }
}

/// Map record fields to column positions.
///
/// Explicitly configured columns must exist. Default header names that are
/// missing just leave the field empty.
fn resolve_columns(
    config: &TableConfig,
    headers: Option<&StringRecord>,
) -> Result<ColumnIndexes, TableError> {
    let mut indexes = ColumnIndexes::default();

    for field in Field::ALL {
        let index = match config.configured_column(field) {
            Some(column) => Some(locate(column, headers).ok_or_else(|| {
                TableError::MissingColumn {
                    field: field.as_str(),
                    column: column.to_string(),
                }
            })?),
            None => config
                .default_column(field)
                .and_then(|column| locate(&column, headers)),
        };
        indexes.set(field, index);
    }

    if !indexes.has_identifying_column() {
        return Err(TableError::NoIdentifyingColumns);
    }

    debug!("Column mapping: {:?}", indexes);
    Ok(indexes)
}

/// Read an input table from a file.
pub fn read_table(path: &Path, config: &TableConfig) -> Result<InputTable, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_records(file, config)
}

/// Read an input table from any reader.
pub fn read_records<R: io::Read>(input: R, config: &TableConfig) -> Result<InputTable, TableError> {
    let delimiter = config
        .delimiter_byte()
        .ok_or_else(|| TableError::InvalidDelimiter(config.delimiter.clone()))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(config.has_headers)
        .flexible(true)
        .from_reader(input);

    let headers = if config.has_headers {
        Some(reader.headers()?.clone())
    } else {
        None
    };
    let columns = resolve_columns(config, headers.as_ref())?;

    let mut records = Vec::new();
    let mut seen_ids = HashSet::new();

    for (row_index, result) in reader.records().enumerate() {
        let row = result?;
        let cell = |index: Option<usize>| index.and_then(|i| row.get(i)).unwrap_or("");

        let id = match columns.id {
            Some(_) => {
                let id = cell(columns.id).trim();
                if id.is_empty() {
                    return Err(TableError::EmptyId(row_index));
                }
                id.to_string()
            }
            None => row_index.to_string(),
        };
        if !seen_ids.insert(id.clone()) {
            return Err(TableError::DuplicateId(id));
        }

        let record = Record::new(id)
            .with_isbn(cell(columns.isbn))
            .with_issn(cell(columns.issn))
            .with_author(cell(columns.author))
            .with_title(cell(columns.title))
            .with_passthrough(row.iter().map(str::to_string).collect());
        records.push(record);
    }

    let without_fields = records
        .iter()
        .filter(|r| !r.has_identifying_fields())
        .count();
    debug!(
        "Read {} records, {} without identifying fields",
        records.len(),
        without_fields
    );

    Ok(InputTable {
        headers: headers.map(|h| h.iter().map(str::to_string).collect()),
        records,
        delimiter,
    })
}

/// Write every input row followed by its result cells.
pub fn write_table(
    path: &Path,
    table: &InputTable,
    resolutions: &[Resolution],
) -> Result<(), TableError> {
    let file = File::create(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_results(file, table, resolutions)
}

/// Write results to any writer.
///
/// Short rows are padded so the result columns line up. Rows wider than the
/// header widen the whole table, header included.
pub fn write_results<W: io::Write>(
    output: W,
    table: &InputTable,
    resolutions: &[Resolution],
) -> Result<(), TableError> {
    if table.records.len() != resolutions.len() {
        return Err(TableError::LengthMismatch {
            records: table.records.len(),
            resolutions: resolutions.len(),
        });
    }

    let widest_row = table
        .records
        .iter()
        .map(|r| r.passthrough.len())
        .max()
        .unwrap_or(0);
    let header_width = table.headers.as_ref().map(Vec::len).unwrap_or(0);
    if table.headers.is_some() && widest_row > header_width {
        warn!(
            "Rows have up to {} cells but the header has {}; padding the header",
            widest_row, header_width
        );
    }
    let width = header_width.max(widest_row);

    let mut writer = WriterBuilder::new()
        .delimiter(table.delimiter)
        .flexible(true)
        .from_writer(output);

    if let Some(headers) = &table.headers {
        writer.write_record(
            headers
                .iter()
                .map(String::as_str)
                .chain(std::iter::repeat("").take(width - header_width))
                .chain(OUTPUT_COLUMNS.iter().copied()),
        )?;
    }

    for (record, resolution) in table.records.iter().zip(resolutions) {
        let padding = width.saturating_sub(record.passthrough.len());
        let note = resolution.note();
        let result_cells = [
            resolution.ddc().unwrap_or(""),
            resolution.lcc().unwrap_or(""),
            resolution.state_name(),
            resolution.strategy().map(|s| s.as_str()).unwrap_or(""),
            note.as_str(),
        ];

        writer.write_record(
            record
                .passthrough
                .iter()
                .map(String::as_str)
                .chain(std::iter::repeat("").take(padding))
                .chain(result_cells),
        )?;
    }

    writer.flush()?;
    Ok(())
}
