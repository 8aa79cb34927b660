// ⚠️ Error Taxonomy
// LoadError / SinkError abort the run, ParseWarning only reroutes a row

use std::path::PathBuf;
use thiserror::Error;

/// Input file could not be turned into a table
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{0} has no header row")]
    MissingHeader(PathBuf),

    #[error("{0} contains no data rows")]
    Empty(PathBuf),

    #[error("line {line} in {path} has {found} fields, header has {expected}")]
    RaggedRow {
        path: PathBuf,
        line: usize,
        found: usize,
        expected: usize,
    },
}

/// Per-row address failure. Never fatal: the row goes to the review file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    #[error("address column '{0}' not present")]
    MissingAddressColumn(String),

    #[error("empty address")]
    EmptyAddress,

    #[error("insufficient segments: found {found}, need {required} separated by '{delimiter}'")]
    InsufficientSegments {
        found: usize,
        required: usize,
        delimiter: char,
    },

    #[error("empty field: {0}")]
    EmptySegment(&'static str),

    #[error("invalid post code '{0}'")]
    InvalidPostCode(String),

    #[error("unparseable address object: {0}")]
    UnparseableObject(String),
}

/// Destination (database or review file) could not be written
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("cannot open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database write failed: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cannot write review file {path}: {source}")]
    Review {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid post code pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Anything that terminates a run with a non-zero exit
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
