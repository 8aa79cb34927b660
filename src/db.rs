use crate::deduplication::fingerprint;
use crate::error::SinkError;
use crate::normalizer::unique_column_name;
use crate::parser::{ParsedAddress, ValidRecord, ADDRESS_FIELDS};
use crate::pipeline::RunSummary;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

pub const ADDRESSES_TABLE: &str = "addresses";

/// Columns the loader owns; input columns with these names get a free `source_` name
const RESERVED_COLUMNS: [&str; 7] = [
    "id",
    "record_hash",
    "street",
    "city",
    "post_code",
    "country",
    "loaded_at",
];

/// What happens to an existing `addresses` table
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Drop and recreate
    #[default]
    Replace,
    /// Keep existing rows, skip rows already present (same record_hash)
    Append,
}

// ============================================================================
// TABLE SCHEMA (input columns → addresses columns)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassthroughColumn {
    /// Position in the normalized record
    pub source_index: usize,
    pub source_name: String,
    /// Name in the `addresses` table
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub passthrough: Vec<PassthroughColumn>,
}

impl TableSchema {
    /// Every normalized column (the raw address included) is carried through.
    /// Names the loader owns are moved aside to a free `source_` name.
    pub fn from_columns(columns: &[String]) -> Self {
        let mut taken: HashSet<String> = RESERVED_COLUMNS.iter().map(|c| c.to_string()).collect();
        taken.extend(columns.iter().cloned());

        let mut passthrough = Vec::with_capacity(columns.len());
        for (source_index, name) in columns.iter().enumerate() {
            let column = if RESERVED_COLUMNS.contains(&name.as_str()) {
                let renamed = unique_column_name(name, "source_", &taken);
                taken.insert(renamed.clone());
                renamed
            } else {
                name.clone()
            };
            passthrough.push(PassthroughColumn {
                source_index,
                source_name: name.clone(),
                column,
            });
        }

        TableSchema { passthrough }
    }

    fn passthrough_sql(&self) -> Vec<String> {
        self.passthrough.iter().map(|p| quote_ident(&p.column)).collect()
    }
}

/// Double-quoted SQLite identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// CONNECTION + DDL
// ============================================================================

pub fn open_database(db_path: &Path) -> Result<Connection, SinkError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path).map_err(|source| SinkError::Open {
        path: db_path.to_path_buf(),
        source,
    })?;

    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    Ok(conn)
}

pub fn setup_database(
    conn: &Connection,
    schema: &TableSchema,
    mode: LoadMode,
) -> Result<(), SinkError> {
    if mode == LoadMode::Replace {
        conn.execute(&format!("DROP TABLE IF EXISTS {}", ADDRESSES_TABLE), [])?;
    }

    // ==========================================================================
    // Addresses Table (one TEXT column per passthrough field)
    // ==========================================================================
    let passthrough_ddl: String = schema
        .passthrough_sql()
        .iter()
        .map(|col| format!("{} TEXT,\n", col))
        .collect();

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_hash TEXT UNIQUE NOT NULL,
                street TEXT,
                city TEXT,
                post_code TEXT,
                country TEXT,
                {}loaded_at TEXT NOT NULL
            )",
            ADDRESSES_TABLE, passthrough_ddl
        ),
        [],
    )?;

    // ==========================================================================
    // Load Runs Table (one audit row per invocation)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS load_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            started_at TEXT NOT NULL,
            input_path TEXT NOT NULL,
            valid_rows INTEGER NOT NULL,
            malformed_rows INTEGER NOT NULL,
            summary TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_addresses_country ON addresses(country)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_addresses_post_code ON addresses(post_code)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// INSERT
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStats {
    pub inserted: usize,
    /// Already present (Append mode)
    pub skipped: usize,
}

/// Insert the batch with one prepared statement.
/// No wrapping transaction: rows written before a failure stay written.
pub fn insert_addresses(
    conn: &Connection,
    schema: &TableSchema,
    records: &[ValidRecord],
) -> Result<InsertStats, SinkError> {
    let mut columns: Vec<String> = vec!["record_hash".to_string()];
    columns.extend(ADDRESS_FIELDS.iter().map(|f| f.to_string()));
    columns.extend(schema.passthrough_sql());
    columns.push("loaded_at".to_string());

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        ADDRESSES_TABLE,
        columns.join(", "),
        placeholders.join(", ")
    ))?;

    let loaded_at = Utc::now().to_rfc3339();
    let mut stats = InsertStats::default();

    for rec in records {
        let hash = fingerprint(rec.record.values.iter().map(String::as_str));

        let mut values: Vec<Option<&str>> = Vec::with_capacity(columns.len());
        values.push(Some(&hash));
        values.extend(rec.address.fields());
        values.extend(
            schema
                .passthrough
                .iter()
                .map(|p| rec.record.get(p.source_index)),
        );
        values.push(Some(&loaded_at));

        match stmt.execute(params_from_iter(values)) {
            Ok(_) => stats.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                stats.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(inserted = stats.inserted, skipped = stats.skipped, "wrote addresses");

    Ok(stats)
}

// ============================================================================
// READ BACK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAddress {
    pub id: i64,
    pub record_hash: String,
    pub address: ParsedAddress,
    /// (table column, value) in schema order
    pub passthrough: Vec<(String, Option<String>)>,
    pub loaded_at: String,
}

impl StoredAddress {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.passthrough
            .iter()
            .find(|(c, _)| c == column)
            .and_then(|(_, v)| v.as_deref())
    }
}

pub fn get_all_addresses(
    conn: &Connection,
    schema: &TableSchema,
) -> Result<Vec<StoredAddress>, SinkError> {
    let mut select = vec![
        "id".to_string(),
        "record_hash".to_string(),
        "street".to_string(),
        "city".to_string(),
        "post_code".to_string(),
        "country".to_string(),
        "loaded_at".to_string(),
    ];
    select.extend(schema.passthrough_sql());

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY id",
        select.join(", "),
        ADDRESSES_TABLE
    ))?;

    let rows = stmt
        .query_map([], |row| {
            let mut passthrough = Vec::with_capacity(schema.passthrough.len());
            for (i, p) in schema.passthrough.iter().enumerate() {
                let value: Option<String> = row.get(7 + i)?;
                passthrough.push((p.column.clone(), value));
            }

            Ok(StoredAddress {
                id: row.get(0)?,
                record_hash: row.get(1)?,
                address: ParsedAddress {
                    street: row.get(2)?,
                    city: row.get(3)?,
                    post_code: row.get(4)?,
                    country: row.get(5)?,
                },
                loaded_at: row.get(6)?,
                passthrough,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn verify_count(conn: &Connection) -> Result<i64, SinkError> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", ADDRESSES_TABLE),
        [],
        |row| row.get(0),
    )?;

    Ok(count)
}

// ============================================================================
// RUN AUDIT TRAIL
// ============================================================================

pub fn record_run(conn: &Connection, summary: &RunSummary) -> Result<(), SinkError> {
    let summary_json = serde_json::to_string(summary)?;

    conn.execute(
        "INSERT INTO load_runs (
            run_id, started_at, input_path, valid_rows, malformed_rows, summary
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            summary.run_id,
            summary.started_at.to_rfc3339(),
            summary.input,
            summary.valid as i64,
            summary.malformed as i64,
            summary_json,
        ],
    )?;

    Ok(())
}

/// All recorded runs, oldest first
pub fn get_runs(conn: &Connection) -> Result<Vec<RunSummary>, SinkError> {
    let mut stmt = conn.prepare("SELECT summary FROM load_runs ORDER BY id")?;

    let raw: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    raw.iter()
        .map(|json| serde_json::from_str(json).map_err(SinkError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::Utc;

    fn columns() -> Vec<String> {
        vec!["name".to_string(), "address".to_string(), "country".to_string()]
    }

    /// Helper function to create valid records with all address fields
    fn create_test_record(line: usize, name: &str, street: &str, city: &str) -> ValidRecord {
        ValidRecord {
            record: Record::new(
                line,
                vec![
                    name.to_string(),
                    format!("{}, {}, 12345, USA", street, city),
                    "us".to_string(),
                ],
            ),
            address: ParsedAddress {
                street: Some(street.to_string()),
                city: Some(city.to_string()),
                post_code: Some("12345".to_string()),
                country: Some("USA".to_string()),
            },
        }
    }

    fn setup(mode: LoadMode) -> (Connection, TableSchema) {
        let conn = Connection::open_in_memory().unwrap();
        let schema = TableSchema::from_columns(&columns());
        setup_database(&conn, &schema, mode).unwrap();
        (conn, schema)
    }

    #[test]
    fn test_schema_renames_reserved_columns() {
        let schema = TableSchema::from_columns(&columns());

        assert_eq!(schema.passthrough.len(), 3);
        assert_eq!(schema.passthrough[0].column, "name");
        assert_eq!(schema.passthrough[0].source_index, 0);
        assert_eq!(schema.passthrough[1].column, "address");
        assert_eq!(schema.passthrough[1].source_index, 1);
        assert_eq!(schema.passthrough[2].column, "source_country");
        assert_eq!(schema.passthrough[2].source_index, 2);
    }

    #[test]
    fn test_renamed_column_does_not_clash_with_input() {
        let conn = Connection::open_in_memory().unwrap();
        let columns: Vec<String> = ["id", "source_id", "address"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let schema = TableSchema::from_columns(&columns);

        let names: Vec<&str> = schema.passthrough.iter().map(|p| p.column.as_str()).collect();
        assert_eq!(names, vec!["source_id_2", "source_id", "address"]);

        setup_database(&conn, &schema, LoadMode::Replace).unwrap();
        let record = ValidRecord {
            record: Record::new(2, vec!["7".into(), "x".into(), "1 A, B, 1, C".into()]),
            address: ParsedAddress::default(),
        };
        insert_addresses(&conn, &schema, &[record]).unwrap();

        let stored = get_all_addresses(&conn, &schema).unwrap();
        assert_eq!(stored[0].get("source_id_2"), Some("7"));
        assert_eq!(stored[0].get("source_id"), Some("x"));
    }

    #[test]
    fn test_round_trip() {
        let (conn, schema) = setup(LoadMode::Replace);
        let records = vec![
            create_test_record(2, "Ann", "123 Main St", "Springfield"),
            create_test_record(3, "Bob", "9 Elm Rd", "Shelbyville"),
        ];

        let stats = insert_addresses(&conn, &schema, &records).unwrap();
        let stored = get_all_addresses(&conn, &schema).unwrap();

        assert_eq!(stats.inserted, 2);
        assert_eq!(verify_count(&conn).unwrap(), 2);
        assert_eq!(stored.len(), 2);
        for (rec, row) in records.iter().zip(&stored) {
            assert_eq!(row.address, rec.address);
            assert_eq!(row.get("name"), rec.record.get(0));
            assert_eq!(row.get("address"), rec.record.get(1));
            assert_eq!(row.get("source_country"), Some("us"));
            assert_eq!(row.record_hash.len(), 64);
        }

        println!("✅ Round trip test PASSED");
    }

    #[test]
    fn test_append_skips_existing_rows() {
        let (conn, schema) = setup(LoadMode::Replace);
        let records = vec![create_test_record(2, "Ann", "123 Main St", "Springfield")];

        let first = insert_addresses(&conn, &schema, &records).unwrap();
        setup_database(&conn, &schema, LoadMode::Append).unwrap();
        let second = insert_addresses(&conn, &schema, &records).unwrap();

        assert_eq!(first.inserted, 1);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(verify_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_replace_drops_previous_rows() {
        let (conn, schema) = setup(LoadMode::Replace);
        let records = vec![create_test_record(2, "Ann", "123 Main St", "Springfield")];
        insert_addresses(&conn, &schema, &records).unwrap();

        setup_database(&conn, &schema, LoadMode::Replace).unwrap();

        assert_eq!(verify_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_odd_column_names_are_quoted() {
        let conn = Connection::open_in_memory().unwrap();
        let columns = vec!["select".to_string(), "a\"b".to_string(), "address".to_string()];
        let schema = TableSchema::from_columns(&columns);
        setup_database(&conn, &schema, LoadMode::Replace).unwrap();

        let record = ValidRecord {
            record: Record::new(2, vec!["x".into(), "y".into(), "1 A, B, 1, C".into()]),
            address: ParsedAddress::default(),
        };
        insert_addresses(&conn, &schema, &[record]).unwrap();

        let stored = get_all_addresses(&conn, &schema).unwrap();
        assert_eq!(stored[0].get("select"), Some("x"));
        assert_eq!(stored[0].get("a\"b"), Some("y"));
    }

    #[test]
    fn test_run_log() {
        let (conn, _) = setup(LoadMode::Replace);
        let summary = RunSummary {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            input: "data/mock_dataset.csv".to_string(),
            rows_loaded: 5,
            duplicates_removed: 1,
            valid: 3,
            malformed: 1,
            inserted: 3,
            skipped: 0,
        };

        record_run(&conn, &summary).unwrap();
        let runs = get_runs(&conn).unwrap();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0], summary);
    }
}
