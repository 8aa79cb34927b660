// 📂 Loader - CSV file → in-memory Table
// Every field is kept as a raw string; typing happens later (address parser).

use crate::error::LoadError;
use crate::record::{Record, Table};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::info;

/// Read the whole CSV file at `csv_path`.
///
/// Rows shorter than the header are padded with empty strings.
/// Rows longer than the header are rejected: there is no column to put the extra values in.
pub fn load_csv(csv_path: &Path) -> Result<Table, LoadError> {
    // Anything that exists but cannot be read as a file is reported by the reader
    if !csv_path.exists() {
        return Err(LoadError::NotFound(csv_path.to_path_buf()));
    }

    let unreadable = |source| LoadError::Unreadable {
        path: csv_path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv_path)
        .map_err(unreadable)?;

    let columns: Vec<String> = rdr
        .headers()
        .map_err(unreadable)?
        .iter()
        .map(str::to_string)
        .collect();

    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(LoadError::MissingHeader(csv_path.to_path_buf()));
    }

    let mut rows = Vec::new();

    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(unreadable)?;

        // +2 because: 1-indexed + header row
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        if record.len() > columns.len() {
            return Err(LoadError::RaggedRow {
                path: csv_path.to_path_buf(),
                line,
                found: record.len(),
                expected: columns.len(),
            });
        }

        let mut values: Vec<String> = record.iter().map(str::to_string).collect();
        values.resize(columns.len(), String::new());

        rows.push(Record::new(line, values));
    }

    if rows.is_empty() {
        return Err(LoadError::Empty(csv_path.to_path_buf()));
    }

    info!(rows = rows.len(), columns = columns.len(), path = %csv_path.display(), "loaded csv");

    Ok(Table::new(columns, rows))
}
