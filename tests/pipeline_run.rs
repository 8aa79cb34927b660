use address_etl::{
    get_all_addresses, get_runs, open_database, run, verify_count, LoadError, LoadMode,
    ParseWarning, PipelineConfig, PipelineError, TableSchema,
};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const MOCK_CSV: &str = "\
ID, Full Name ,Address,Email
1,Ann Lee,\"123 Main St, Springfield, 12345, USA\",ann@example.com
2,Bob Ray,garbled-no-delimiters,bob@example.com
1,Ann Lee,\"123 Main St, Springfield, 12345, USA\",ann@example.com
3,Cid Fox,\"9 Elm Rd, Shelbyville, 54321, USA\",cid@example.com
4,Dee Poe,\"{'address': {'streeet': 'Lipowa 3', 'city': 'Krakow', 'post code': 31-123, 'country': 'Poland',}}\",dee@example.com
5,Eve Kim,\"1 Oak Ave, Ogdenville, ZIP, USA\",eve@example.com
";

fn workspace(csv: &str) -> (TempDir, PipelineConfig) {
    let dir = tempdir().unwrap();
    let input = dir.path().join("mock_dataset.csv");
    fs::write(&input, csv).unwrap();

    let config = PipelineConfig {
        input,
        database: dir.path().join("out").join("db.sqlite"),
        malformed_output: dir.path().join("out").join("broken_addresses.csv"),
        ..PipelineConfig::default()
    };
    (dir, config)
}

fn review_rows(path: &Path) -> Vec<csv::StringRecord> {
    csv::Reader::from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap())
        .collect()
}

#[test]
fn test_full_run() {
    let (_dir, config) = workspace(MOCK_CSV);

    let result = run(&config).unwrap();
    let summary = &result.summary;

    assert_eq!(summary.rows_loaded, 6);
    assert_eq!(summary.duplicates_removed, 1);
    assert_eq!(summary.valid, 3);
    assert_eq!(summary.malformed, 2);
    assert_eq!(summary.valid + summary.malformed, summary.rows_loaded - summary.duplicates_removed);
    assert_eq!(summary.inserted, 3);

    // database
    let conn = open_database(&config.database).unwrap();
    let columns: Vec<String> = ["id", "full_name", "address", "email"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let schema = TableSchema::from_columns(&columns);
    let stored = get_all_addresses(&conn, &schema).unwrap();

    assert_eq!(verify_count(&conn).unwrap(), 3);
    assert_eq!(stored[0].address.street.as_deref(), Some("123 Main St"));
    assert_eq!(stored[0].address.city.as_deref(), Some("Springfield"));
    assert_eq!(stored[0].address.post_code.as_deref(), Some("12345"));
    assert_eq!(stored[0].address.country.as_deref(), Some("USA"));
    assert_eq!(stored[0].get("source_id"), Some("1"));
    assert_eq!(stored[0].get("full_name"), Some("Ann Lee"));
    assert_eq!(
        stored[0].get("address"),
        Some("123 Main St, Springfield, 12345, USA")
    );
    assert_eq!(stored[2].address.city.as_deref(), Some("Krakow"));

    // review file
    let rows = review_rows(&config.malformed_output);
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][2], "garbled-no-delimiters");
    assert!(rows[0][5].contains("insufficient segments"));
    assert!(rows[1][5].contains("invalid post code"));

    // audit row
    let runs = get_runs(&conn).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(&runs[0], summary);

    println!("✅ Full pipeline test PASSED");
}

#[test]
fn test_missing_input_creates_no_database() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        input: dir.path().join("nope.csv"),
        database: dir.path().join("db.sqlite"),
        malformed_output: dir.path().join("broken.csv"),
        ..PipelineConfig::default()
    };

    let err = run(&config).unwrap_err();

    assert!(matches!(err, PipelineError::Load(LoadError::NotFound(_))));
    assert!(err.to_string().contains("not found"));
    assert!(!config.database.exists());
    assert!(!config.malformed_output.exists());
}

#[test]
fn test_rerun_replace_is_stable() {
    let (_dir, config) = workspace(MOCK_CSV);

    run(&config).unwrap();
    run(&config).unwrap();

    let conn = open_database(&config.database).unwrap();
    assert_eq!(verify_count(&conn).unwrap(), 3);
    assert_eq!(get_runs(&conn).unwrap().len(), 2);
}

#[test]
fn test_rerun_append_skips_loaded_rows() {
    let (_dir, mut config) = workspace(MOCK_CSV);
    config.mode = LoadMode::Append;

    let first = run(&config).unwrap();
    let second = run(&config).unwrap();

    assert_eq!(first.summary.inserted, 3);
    assert_eq!(second.summary.inserted, 0);
    assert_eq!(second.summary.skipped, 3);
}

#[test]
fn test_missing_address_column_routes_everything_to_review() {
    let (_dir, config) = workspace("id,name\n1,Ann\n2,Bob\n");

    let result = run(&config).unwrap();

    assert_eq!(result.summary.valid, 0);
    assert_eq!(result.summary.malformed, 2);
    assert_eq!(
        result.malformed[0].reason,
        ParseWarning::MissingAddressColumn("address".to_string())
    );
}

#[test]
fn test_clean_input_leaves_no_review_file() {
    let (_dir, config) = workspace("name,address\nAnn,\"1 A St, Town, 11111, USA\"\n");

    let result = run(&config).unwrap();

    assert_eq!(result.summary.malformed, 0);
    assert!(!config.malformed_output.exists());
}
