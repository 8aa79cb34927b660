// 🔄 Pipeline - Loader → Normalizer → Deduplicator → Address Parser → Sink
// Each stage runs over the whole table before the next one starts.

use crate::config::PipelineConfig;
use crate::db::{insert_addresses, open_database, record_run, setup_database, TableSchema};
use crate::deduplication::Deduplicator;
use crate::error::Result;
use crate::loader::load_csv;
use crate::normalizer::normalize_table;
use crate::parser::{classify, AddressRule, Classified, MalformedRecord};
use crate::record::Table;
use crate::review::write_malformed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counts for one invocation, also stored in `load_runs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub input: String,
    pub rows_loaded: usize,
    pub duplicates_removed: usize,
    pub valid: usize,
    pub malformed: usize,
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub summary: RunSummary,
    pub malformed: Vec<MalformedRecord>,
}

/// The pure part: normalize, dedupe, classify.
/// Returns the number of duplicates removed and the classified rows.
pub fn clean(table: &Table, config: &PipelineConfig, rule: &AddressRule) -> (usize, Classified) {
    let normalized = normalize_table(table, config.lowercase_values);
    let deduped = Deduplicator::new(config.dedup_key()).dedupe(&normalized);
    let classified = classify(&deduped.table, rule, &config.normalized_address_column());

    (deduped.removed(), classified)
}

/// Run the whole batch once.
///
/// Nothing is created on disk until the input has loaded, so a missing input
/// file leaves no database behind.
pub fn run(config: &PipelineConfig) -> Result<PipelineRun> {
    config.validate()?;
    let rule = config.address_rule()?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    info!(%run_id, input = %config.input.display(), "starting run");

    let raw = load_csv(&config.input)?;
    let (duplicates_removed, classified) = clean(&raw, config, &rule);

    let schema = TableSchema::from_columns(&classified.columns);
    let conn = open_database(&config.database)?;
    setup_database(&conn, &schema, config.mode)?;
    let stats = insert_addresses(&conn, &schema, &classified.valid)?;

    write_malformed(
        &config.malformed_output,
        &classified.columns,
        &classified.malformed,
    )?;

    let summary = RunSummary {
        run_id,
        started_at,
        input: config.input.display().to_string(),
        rows_loaded: raw.len(),
        duplicates_removed,
        valid: classified.valid.len(),
        malformed: classified.malformed.len(),
        inserted: stats.inserted,
        skipped: stats.skipped,
    };
    record_run(&conn, &summary)?;

    info!(
        valid = summary.valid,
        malformed = summary.malformed,
        duplicates = summary.duplicates_removed,
        "run complete"
    );

    Ok(PipelineRun {
        summary,
        malformed: classified.malformed,
    })
}
