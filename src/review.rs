// 📝 Review file - malformed rows for a human to look at
// Columns: every normalized input column, then line_number and reason
// (prefixed with review_ when the input already has a column of that name).

use crate::error::SinkError;
use crate::normalizer::unique_column_name;
use crate::parser::MalformedRecord;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Write `records` to `path`. Returns the number of rows written.
///
/// With nothing to review, a review file left over from an earlier run is removed
/// so it cannot be mistaken for this run's output.
pub fn write_malformed(
    path: &Path,
    columns: &[String],
    records: &[MalformedRecord],
) -> Result<usize, SinkError> {
    if records.is_empty() {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        return Ok(0);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let review_err = |source| SinkError::Review {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(review_err)?;

    let mut taken: HashSet<String> = columns.iter().cloned().collect();
    let line_column = unique_column_name("line_number", "review_", &taken);
    taken.insert(line_column.clone());
    let reason_column = unique_column_name("reason", "review_", &taken);

    let mut header: Vec<&str> = columns.iter().map(String::as_str).collect();
    header.push(&line_column);
    header.push(&reason_column);
    writer.write_record(&header).map_err(review_err)?;

    for rec in records {
        let line = rec.record.line_number.to_string();
        let reason = rec.reason.to_string();

        let mut row: Vec<&str> = rec.record.values.iter().map(String::as_str).collect();
        row.push(&line);
        row.push(&reason);
        writer.write_record(&row).map_err(review_err)?;
    }

    writer.flush()?;

    info!(rows = records.len(), path = %path.display(), "wrote review file");

    Ok(records.len())
}
