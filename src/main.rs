use address_etl::{logging, run, LoadMode, PipelineConfig, PipelineRun};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// How many malformed rows to echo to the console
const MALFORMED_SAMPLES: usize = 3;
const SAMPLE_WIDTH: usize = 120;

#[derive(Parser, Debug)]
#[command(
    name = "address-etl",
    version,
    about = "Clean a CSV of address records and load it into SQLite"
)]
struct Cli {
    /// TOML file with pipeline settings
    #[arg(long, env = "ADDRESS_ETL_CONFIG")]
    config: Option<PathBuf>,

    /// Input CSV
    #[arg(long, env = "ADDRESS_ETL_INPUT")]
    input: Option<PathBuf>,

    /// Output SQLite database
    #[arg(long, env = "ADDRESS_ETL_DATABASE")]
    database: Option<PathBuf>,

    /// Review file for malformed rows
    #[arg(long, env = "ADDRESS_ETL_MALFORMED")]
    malformed: Option<PathBuf>,

    /// Column holding the free-text address
    #[arg(long)]
    address_column: Option<String>,

    /// Deduplicate on this column (repeatable). Default: whole row.
    #[arg(long = "key-column")]
    key_columns: Vec<String>,

    #[arg(long, value_enum)]
    mode: Option<LoadMode>,

    /// Lowercase every value before deduplication
    #[arg(long)]
    lowercase_values: bool,

    /// Minimum non-empty address parts (1-4)
    #[arg(long)]
    min_segments: Option<usize>,

    /// Address part separator
    #[arg(long)]
    delimiter: Option<char>,
}

impl Cli {
    /// defaults < config file < flags
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(malformed) = self.malformed {
            config.malformed_output = malformed;
        }
        if let Some(column) = self.address_column {
            config.address_column = column;
        }
        if !self.key_columns.is_empty() {
            config.key_columns = self.key_columns;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.lowercase_values {
            config.lowercase_values = true;
        }
        if let Some(min_segments) = self.min_segments {
            config.address.min_segments = min_segments;
        }
        if let Some(delimiter) = self.delimiter {
            config.address.delimiter = delimiter;
        }

        Ok(config)
    }
}

fn main() -> ExitCode {
    logging::init_logging();

    match run_import(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_import(cli: Cli) -> Result<()> {
    let config = cli.into_config().context("Invalid configuration")?;

    println!("🗄️  Address ETL - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 Input:    {}", config.input.display());
    println!("💾 Database: {}", config.database.display());

    let PipelineRun { summary, malformed } = run(&config)
        .with_context(|| format!("Pipeline failed for {}", config.input.display()))?;

    println!("\n✓ Loaded {} rows", summary.rows_loaded);
    println!("✓ Removed {} duplicates", summary.duplicates_removed);
    println!(
        "✓ Inserted {} rows into addresses ({} already present)",
        summary.inserted, summary.skipped
    );

    if malformed.is_empty() {
        println!("✓ No malformed addresses detected");
    } else {
        println!(
            "\n⚠️  Malformed address rows: {} (saved to {})",
            malformed.len(),
            config.malformed_output.display()
        );
        for rec in malformed.iter().take(MALFORMED_SAMPLES) {
            let sample: String = rec.raw_address.chars().take(SAMPLE_WIDTH).collect();
            println!("   Line {}: {} ({})", rec.record.line_number, sample, rec.reason);
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✅ Run {} complete: {} good rows, {} bad rows",
        summary.run_id, summary.valid, summary.malformed
    );

    Ok(())
}
