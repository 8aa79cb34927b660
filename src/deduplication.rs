// 🔍 Deduplication Engine - drop repeated rows, keep first-seen order
// Two keys: Full Row (every column) or declared Key Columns

use crate::record::Table;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{info, warn};

// Field separator for fingerprints: "a,b" + "c" must not equal "a" + "b,c"
const UNIT_SEPARATOR: &[u8] = &[0x1f];

// ============================================================================
// DEDUP KEY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DedupKey {
    /// Rows equal on every column
    #[default]
    FullRow,

    /// Rows equal on the listed (normalized) columns
    Columns(Vec<String>),
}

// ============================================================================
// DUPLICATE MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    /// Source line of the row that was kept
    pub kept_line: usize,

    /// Source line of the row that was dropped
    pub dropped_line: usize,

    /// SHA-256 of the compared values
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub table: Table,
    pub duplicates: Vec<DuplicateMatch>,
}

impl DedupOutcome {
    pub fn removed(&self) -> usize {
        self.duplicates.len()
    }
}

// ============================================================================
// DEDUPLICATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    pub key: DedupKey,
}

impl Deduplicator {
    pub fn new(key: DedupKey) -> Self {
        Deduplicator { key }
    }

    /// Column indexes the fingerprint covers for `table`.
    /// Unknown key columns fall back to the full row.
    fn key_indexes(&self, table: &Table) -> Vec<usize> {
        let all = || -> Vec<usize> { (0..table.columns.len()).collect() };

        match &self.key {
            DedupKey::FullRow => all(),
            DedupKey::Columns(names) if names.is_empty() => all(),
            DedupKey::Columns(names) => {
                let found: Option<Vec<usize>> =
                    names.iter().map(|n| table.column_index(n)).collect();
                match found {
                    Some(indexes) => indexes,
                    None => {
                        warn!(key = ?names, columns = ?table.columns, "key column missing, comparing full rows");
                        all()
                    }
                }
            }
        }
    }

    /// Remove duplicate rows. The first occurrence wins.
    pub fn dedupe(&self, table: &Table) -> DedupOutcome {
        let indexes = self.key_indexes(table);

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut rows = Vec::with_capacity(table.len());
        let mut duplicates = Vec::new();

        for row in &table.rows {
            let fingerprint = fingerprint(indexes.iter().map(|&i| row.get(i).unwrap_or_default()));

            match seen.get(&fingerprint) {
                Some(&kept_line) => duplicates.push(DuplicateMatch {
                    kept_line,
                    dropped_line: row.line_number,
                    fingerprint,
                }),
                None => {
                    seen.insert(fingerprint, row.line_number);
                    rows.push(row.clone());
                }
            }
        }

        info!(kept = rows.len(), removed = duplicates.len(), "deduplicated rows");

        DedupOutcome {
            table: table.with_rows(rows),
            duplicates,
        }
    }
}

/// SHA-256 hex over unit-separated values
pub fn fingerprint<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for value in values {
        hasher.update(value.as_bytes());
        hasher.update(UNIT_SEPARATOR);
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
