// Address ETL - Core Library
// Exposes all stages for use in the CLI and tests

pub mod config;
pub mod db;
pub mod deduplication;
pub mod error;
pub mod loader;
pub mod logging;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod review;

// Re-export commonly used types
pub use config::{AddressRuleConfig, PipelineConfig};
pub use db::{
    get_all_addresses, get_runs, insert_addresses, open_database, record_run, setup_database,
    verify_count, InsertStats, LoadMode, StoredAddress, TableSchema, ADDRESSES_TABLE,
};
pub use deduplication::{DedupKey, DedupOutcome, Deduplicator, DuplicateMatch};
pub use error::{ConfigError, LoadError, ParseWarning, PipelineError, SinkError};
pub use loader::load_csv;
pub use normalizer::{normalize_header, normalize_table};
pub use parser::{
    classify, AddressRule, Classified, MalformedRecord, ParsedAddress, ValidRecord,
    ADDRESS_FIELDS,
};
pub use pipeline::{clean, run, PipelineRun, RunSummary};
pub use record::{Record, Table};
pub use review::write_malformed;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
