// 🧹 Normalizer - canonical column names
// "  Post Code " → "post_code"

use crate::record::{Record, Table};
use std::collections::HashSet;
use tracing::{info, warn};

/// Trim, spaces → underscores, lowercase
pub fn normalize_header(header: &str) -> String {
    header.trim().replace(' ', "_").to_lowercase()
}

/// `name` if free, otherwise `<prefix><name>`, then `<prefix><name>_2`, `_3`, ...
pub fn unique_column_name(name: &str, prefix: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }

    let base = format!("{}{}", prefix, name);
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    candidate
}

/// Rename every column with `normalize_header`.
///
/// When two headers collapse to the same name only the first column is kept.
/// With `lowercase_values` every cell is lowercased as well.
pub fn normalize_table(table: &Table, lowercase_values: bool) -> Table {
    let mut columns: Vec<String> = Vec::with_capacity(table.columns.len());
    let mut keep: Vec<usize> = Vec::with_capacity(table.columns.len());

    for (idx, raw) in table.columns.iter().enumerate() {
        let name = normalize_header(raw);
        if columns.contains(&name) {
            warn!(column = %raw, normalized = %name, "dropping duplicate column");
            continue;
        }
        columns.push(name);
        keep.push(idx);
    }

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let values = keep
                .iter()
                .map(|&i| {
                    let v = row.get(i).unwrap_or_default();
                    if lowercase_values {
                        v.to_lowercase()
                    } else {
                        v.to_string()
                    }
                })
                .collect();
            Record::new(row.line_number, values)
        })
        .collect();

    info!(columns = ?columns, "normalized columns");

    Table::new(columns, rows)
}
