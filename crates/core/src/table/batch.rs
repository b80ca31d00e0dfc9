//! Splitting large tables into batches and joining them back.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use tracing::{info, warn};

use super::config::TableConfig;
use super::TableError;

/// Rows per batch file unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Path of the `number`-th (1-based) batch file for `stem`.
pub fn batch_path(dir: &Path, stem: &str, number: usize) -> PathBuf {
    dir.join(format!("{}-batched-{:04}.csv", stem, number))
}

fn open_writer(path: &Path, delimiter: u8) -> Result<Writer<File>, TableError> {
    let file = File::create(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(file))
}

fn open_reader(path: &Path, config: &TableConfig, delimiter: u8) -> Result<csv::Reader<File>, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(config.has_headers)
        .flexible(true)
        .from_reader(file))
}

/// Split `input` into files of at most `batch_size` data rows.
///
/// Every batch repeats the header row. Files are named
/// `<stem>-batched-0001.csv`, `<stem>-batched-0002.csv`, ... and written to
/// `out_dir`, or next to the input when no directory is given. An input
/// without data rows still produces one file.
pub fn split_table(
    input: &Path,
    out_dir: Option<&Path>,
    batch_size: usize,
    config: &TableConfig,
) -> Result<Vec<PathBuf>, TableError> {
    if batch_size == 0 {
        return Err(TableError::InvalidBatchSize);
    }
    let delimiter = config
        .delimiter_byte()
        .ok_or_else(|| TableError::InvalidDelimiter(config.delimiter.clone()))?;

    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());

    let mut reader = open_reader(input, config, delimiter)?;
    let headers = if config.has_headers {
        Some(reader.headers()?.clone())
    } else {
        None
    };

    let start_batch = |files: &mut Vec<PathBuf>| -> Result<Writer<File>, TableError> {
        let path = batch_path(&dir, &stem, files.len() + 1);
        let mut writer = open_writer(&path, delimiter)?;
        if let Some(headers) = &headers {
            writer.write_record(headers)?;
        }
        files.push(path);
        Ok(writer)
    };

    let mut files = Vec::new();
    let mut writer = start_batch(&mut files)?;
    let mut rows_in_batch = 0;
    let mut row = StringRecord::new();

    while reader.read_record(&mut row)? {
        if rows_in_batch == batch_size {
            writer.flush()?;
            writer = start_batch(&mut files)?;
            rows_in_batch = 0;
        }
        writer.write_record(&row)?;
        rows_in_batch += 1;
    }
    writer.flush()?;

    info!("Split {} into {} batch files", input.display(), files.len());
    Ok(files)
}

/// Concatenate tables into `output`, writing the header of the first once.
///
/// Returns the number of data rows written.
pub fn join_tables(
    inputs: &[PathBuf],
    output: &Path,
    config: &TableConfig,
) -> Result<usize, TableError> {
    if inputs.is_empty() {
        return Err(TableError::NoInputs);
    }
    let delimiter = config
        .delimiter_byte()
        .ok_or_else(|| TableError::InvalidDelimiter(config.delimiter.clone()))?;

    let mut writer = open_writer(output, delimiter)?;
    let mut first_headers: Option<StringRecord> = None;
    let mut rows = 0;
    let mut row = StringRecord::new();

    for input in inputs {
        let mut reader = open_reader(input, config, delimiter)?;

        if config.has_headers {
            let headers = reader.headers()?.clone();
            match &first_headers {
                None => {
                    writer.write_record(&headers)?;
                    first_headers = Some(headers);
                }
                Some(first) if *first != headers => {
                    warn!(
                        "Header of {} differs from the first input; rows are joined as-is",
                        input.display()
                    );
                }
                Some(_) => {}
            }
        }

        while reader.read_record(&mut row)? {
            writer.write_record(&row)?;
            rows += 1;
        }
    }
    writer.flush()?;

    info!(
        "Joined {} files into {} ({} rows)",
        inputs.len(),
        output.display(),
        rows
    );
    Ok(rows)
}
