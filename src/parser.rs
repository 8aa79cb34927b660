// 🏗️ Address Parser - free-text address → street / city / post_code / country
// One explicit rule (AddressRule) decides valid vs malformed for every row.

use crate::error::{ConfigError, ParseWarning};
use crate::record::{Record, Table};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Output column names, in positional order
pub const ADDRESS_FIELDS: [&str; 4] = ["street", "city", "post_code", "country"];

pub const DEFAULT_DELIMITER: char = ',';
pub const DEFAULT_MIN_SEGMENTS: usize = 4;
pub const DEFAULT_POST_CODE_PATTERN: &str = r"^[0-9]{1,5}(-[0-9]{1,5})?$";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub post_code: Option<String>,
    pub country: Option<String>,
}

impl ParsedAddress {
    fn from_parts([street, city, post_code, country]: [Option<String>; 4]) -> Self {
        ParsedAddress {
            street,
            city,
            post_code,
            country,
        }
    }

    /// Values in `ADDRESS_FIELDS` order
    pub fn fields(&self) -> [Option<&str>; 4] {
        [
            self.street.as_deref(),
            self.city.as_deref(),
            self.post_code.as_deref(),
            self.country.as_deref(),
        ]
    }
}

/// Row whose address parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecord {
    pub record: Record,
    pub address: ParsedAddress,
}

/// Row routed to manual review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub record: Record,
    pub raw_address: String,
    pub reason: ParseWarning,
}

/// Result of running the rule over a whole table
#[derive(Debug, Clone)]
pub struct Classified {
    pub columns: Vec<String>,
    pub address_column: String,
    pub valid: Vec<ValidRecord>,
    pub malformed: Vec<MalformedRecord>,
}

impl Classified {
    pub fn total(&self) -> usize {
        self.valid.len() + self.malformed.len()
    }
}

// ============================================================================
// ADDRESS RULE
// ============================================================================

/// The malformed-row policy.
///
/// Delimited addresses (`"123 Main St, Springfield, 12345, USA"`) are split on
/// `delimiter`. The last three segments are city, post code and country; anything
/// before them is the street, so `"Flat 2, 9 High St, Leeds, 12345, UK"` keeps
/// `"Flat 2, 9 High St"` as the street. With fewer than four segments the parts are
/// assigned left to right.
///
/// Addresses starting with `{` are read as an embedded object:
/// `{'address': {'streeet': ..., 'city': ..., 'post code': 12-345, 'country': ...}}`.
///
/// Both forms must then have the first `min_segments` fields non-empty and a post
/// code (when present) matching `post_code`.
#[derive(Debug, Clone)]
pub struct AddressRule {
    delimiter: char,
    min_segments: usize,
    post_code: Regex,
    bare_post_code: Regex,
    trailing_comma: Regex,
}

#[derive(Debug, Deserialize)]
struct EmbeddedEnvelope {
    #[serde(default)]
    address: Option<EmbeddedAddress>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedAddress {
    #[serde(default, alias = "streeet")]
    street: Option<serde_json::Value>,
    #[serde(default)]
    city: Option<serde_json::Value>,
    #[serde(default, rename = "post code", alias = "post_code", alias = "postcode")]
    post_code: Option<serde_json::Value>,
    #[serde(default)]
    country: Option<serde_json::Value>,
}

impl AddressRule {
    pub fn new(
        delimiter: char,
        min_segments: usize,
        post_code_pattern: &str,
    ) -> Result<Self, ConfigError> {
        if !(1..=ADDRESS_FIELDS.len()).contains(&min_segments) {
            return Err(ConfigError::Invalid(format!(
                "min_segments must be between 1 and {}, got {}",
                ADDRESS_FIELDS.len(),
                min_segments
            )));
        }
        if delimiter == '{' || delimiter == '}' || delimiter.is_whitespace() {
            return Err(ConfigError::Invalid(format!(
                "unusable address delimiter {:?}",
                delimiter
            )));
        }

        Ok(AddressRule {
            delimiter,
            min_segments,
            post_code: Regex::new(post_code_pattern)?,
            bare_post_code: Regex::new(r#""post code":\s*([0-9]{1,5}-[0-9]{1,5})"#)?,
            trailing_comma: Regex::new(r",\s*}")?,
        })
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn min_segments(&self) -> usize {
        self.min_segments
    }

    pub fn post_code_pattern(&self) -> &str {
        self.post_code.as_str()
    }

    /// Classify one address string. Same input, same answer.
    pub fn parse(&self, raw: &str) -> Result<ParsedAddress, ParseWarning> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseWarning::EmptyAddress);
        }

        let parts = if trimmed.starts_with('{') {
            self.split_embedded(trimmed)?
        } else {
            self.split_delimited(trimmed)?
        };

        self.validate(parts)
    }

    fn split_delimited(&self, address: &str) -> Result<[Option<String>; 4], ParseWarning> {
        let found = address.split(self.delimiter).count();
        if found < self.min_segments {
            return Err(ParseWarning::InsufficientSegments {
                found,
                required: self.min_segments,
                delimiter: self.delimiter,
            });
        }

        let mut segments: Vec<&str> = if found > ADDRESS_FIELDS.len() {
            // country, post code, city, then the rest is street
            let mut tail: Vec<&str> = address.rsplitn(ADDRESS_FIELDS.len(), self.delimiter).collect();
            tail.reverse();
            tail
        } else {
            address.split(self.delimiter).collect()
        };
        segments.resize(ADDRESS_FIELDS.len(), "");

        let mut parts: [Option<String>; 4] = Default::default();
        for (slot, segment) in parts.iter_mut().zip(segments) {
            *slot = non_empty(segment);
        }
        Ok(parts)
    }

    fn split_embedded(&self, address: &str) -> Result<[Option<String>; 4], ParseWarning> {
        let mut fixed = address.to_string();

        // Cut-off objects usually lose exactly one closing brace
        if fixed.matches('{').count() > fixed.matches('}').count() {
            fixed.push('}');
        }
        if fixed.matches('{').count() != fixed.matches('}').count() {
            return Err(ParseWarning::UnparseableObject("unbalanced braces".to_string()));
        }

        let fixed = fixed.replace('\'', "\"");
        let fixed = self.bare_post_code.replace_all(&fixed, r#""post code": "$1""#);
        let fixed = self.trailing_comma.replace_all(&fixed, "}");

        let envelope: EmbeddedEnvelope = serde_json::from_str(&fixed)
            .map_err(|e| ParseWarning::UnparseableObject(e.to_string()))?;

        let address = envelope
            .address
            .ok_or_else(|| ParseWarning::UnparseableObject("no 'address' key".to_string()))?;

        Ok([
            address.street.and_then(json_text),
            address.city.and_then(json_text),
            address.post_code.and_then(json_text),
            address.country.and_then(json_text),
        ])
    }

    fn validate(&self, parts: [Option<String>; 4]) -> Result<ParsedAddress, ParseWarning> {
        let required = self.min_segments.min(parts.len());
        if let Some(idx) = parts[..required].iter().position(Option::is_none) {
            return Err(ParseWarning::EmptySegment(ADDRESS_FIELDS[idx]));
        }

        if let Some(post_code) = &parts[2] {
            if !self.post_code.is_match(post_code) {
                return Err(ParseWarning::InvalidPostCode(post_code.clone()));
            }
        }

        Ok(ParsedAddress::from_parts(parts))
    }
}

impl Default for AddressRule {
    fn default() -> Self {
        AddressRule::new(DEFAULT_DELIMITER, DEFAULT_MIN_SEGMENTS, DEFAULT_POST_CODE_PATTERN)
            .expect("built-in address rule is valid")
    }
}

fn non_empty(segment: &str) -> Option<String> {
    let segment = segment.trim();
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

fn json_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => non_empty(&s),
        other => non_empty(&other.to_string()),
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Split `table` into valid and malformed rows. Every row lands in exactly one side.
pub fn classify(table: &Table, rule: &AddressRule, address_column: &str) -> Classified {
    let address_idx = table.column_index(address_column);

    let mut valid = Vec::new();
    let mut malformed = Vec::new();

    for row in &table.rows {
        let (raw_address, result) = match address_idx {
            Some(idx) => {
                let raw = row.get(idx).unwrap_or_default();
                (raw.to_string(), rule.parse(raw))
            }
            None => (
                String::new(),
                Err(ParseWarning::MissingAddressColumn(address_column.to_string())),
            ),
        };

        match result {
            Ok(address) => valid.push(ValidRecord {
                record: row.clone(),
                address,
            }),
            Err(reason) => {
                debug!(line = row.line_number, %reason, "malformed address");
                malformed.push(MalformedRecord {
                    record: row.clone(),
                    raw_address,
                    reason,
                });
            }
        }
    }

    info!(valid = valid.len(), malformed = malformed.len(), "classified addresses");

    Classified {
        columns: table.columns.clone(),
        address_column: address_column.to_string(),
        valid,
        malformed,
    }
}

// ============================================================================
// TESTS
// ============================================================================
