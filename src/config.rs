// ⚙️ Pipeline configuration
// defaults < TOML file < CLI flags / env (applied by the binary)

use crate::db::LoadMode;
use crate::deduplication::DedupKey;
use crate::error::ConfigError;
use crate::normalizer::normalize_header;
use crate::parser::{AddressRule, DEFAULT_DELIMITER, DEFAULT_MIN_SEGMENTS, DEFAULT_POST_CODE_PATTERN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CSV to read
    pub input: PathBuf,

    /// SQLite file to write
    pub database: PathBuf,

    /// Review file for malformed rows
    pub malformed_output: PathBuf,

    /// Column holding the free-text address (after normalization)
    pub address_column: String,

    /// Dedup on these columns only; empty means full-row equality
    pub key_columns: Vec<String>,

    pub mode: LoadMode,

    /// Lowercase every cell during normalization
    pub lowercase_values: bool,

    pub address: AddressRuleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressRuleConfig {
    pub delimiter: char,
    pub min_segments: usize,
    pub post_code_pattern: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            input: PathBuf::from("data/mock_dataset.csv"),
            database: PathBuf::from("db.sqlite"),
            malformed_output: PathBuf::from("broken_addresses.csv"),
            address_column: "address".to_string(),
            key_columns: Vec::new(),
            mode: LoadMode::Replace,
            lowercase_values: false,
            address: AddressRuleConfig::default(),
        }
    }
}

impl Default for AddressRuleConfig {
    fn default() -> Self {
        AddressRuleConfig {
            delimiter: DEFAULT_DELIMITER,
            min_segments: DEFAULT_MIN_SEGMENTS,
            post_code_pattern: DEFAULT_POST_CODE_PATTERN.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn address_rule(&self) -> Result<AddressRule, ConfigError> {
        AddressRule::new(
            self.address.delimiter,
            self.address.min_segments,
            &self.address.post_code_pattern,
        )
    }

    /// Key columns are matched against normalized headers, so they are normalized too
    pub fn dedup_key(&self) -> DedupKey {
        if self.key_columns.is_empty() {
            DedupKey::FullRow
        } else {
            DedupKey::Columns(self.key_columns.iter().map(|c| normalize_header(c)).collect())
        }
    }

    pub fn normalized_address_column(&self) -> String {
        normalize_header(&self.address_column)
    }

    /// Checks that need no I/O
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address_column.trim().is_empty() {
            return Err(ConfigError::Invalid("address_column is empty".to_string()));
        }
        if self.database == self.malformed_output {
            return Err(ConfigError::Invalid(format!(
                "database and malformed_output both point to {}",
                self.database.display()
            )));
        }
        self.address_rule().map(|_| ())
    }
}
