//! Command-line interface for pipecompare

use crate::config::{validate_precision, validate_tolerance, ComparisonConfig, EngineSettings};
use crate::error::{CompareError, Result};
use crate::source::{TableFormat, TablePair};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pipecompare")]
#[command(about = "Reconcile a target dataset against a control dataset")]
#[command(version)]
pub struct Cli {
    /// Table names found under both --control-root and --target-root
    #[arg(long, num_args = 1..)]
    pub tables: Vec<String>,

    /// Storage format of path-addressed tables
    #[arg(long, default_value = "parquet", value_parser = TableFormat::parse)]
    pub format: TableFormat,

    /// Directory holding the control tables
    #[arg(long)]
    pub control_root: Option<PathBuf>,

    /// Directory holding the target tables
    #[arg(long)]
    pub target_root: Option<PathBuf>,

    /// Catalog tables to use as control, paired by position with --target-tables
    #[arg(long, num_args = 1.., conflicts_with = "tables", requires = "target_tables")]
    pub control_tables: Vec<String>,

    /// Catalog tables to use as target
    #[arg(long, num_args = 1.., conflicts_with = "tables", requires = "control_tables")]
    pub target_tables: Vec<String>,

    /// DuckDB database file holding catalog tables (in-memory when omitted)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Round fractional columns to this many decimal places before comparing
    #[arg(long, value_parser = parse_precision)]
    pub compare_precision: Option<u32>,

    /// Maximum fraction of changed rows (0 to 1) before a pair fails
    #[arg(long, value_parser = parse_tolerance)]
    pub row_diff_tolerance: Option<f64>,

    /// Maximum rows shown per difference preview
    #[arg(long)]
    pub preview_rows: Option<usize>,

    /// JSON file with comparison defaults; command-line flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write a JSON report of every pair to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Stop at the first failing pair
    #[arg(long)]
    pub fail_fast: bool,

    /// DuckDB memory limit, e.g. "4GB"
    #[arg(long)]
    pub memory_limit: Option<String>,

    /// DuckDB worker threads
    #[arg(long)]
    pub threads: Option<usize>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Logger filter for this invocation; `--verbose` enables debug output
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }

    /// Resolve the control/target pairs named on the command line
    pub fn table_pairs(&self) -> Result<Vec<TablePair>> {
        if !self.tables.is_empty() {
            let (control_root, target_root) = match (&self.control_root, &self.target_root) {
                (Some(c), Some(t)) => (c, t),
                _ => {
                    return Err(CompareError::invalid_input(
                        "--tables requires --control-root and --target-root",
                    ))
                }
            };
            return Ok(TablePair::from_roots(
                &self.tables,
                control_root,
                target_root,
                self.format,
            ));
        }

        if !self.control_tables.is_empty() {
            return TablePair::from_catalog(&self.control_tables, &self.target_tables);
        }

        Err(CompareError::invalid_input(
            "Nothing to compare: pass --tables with --control-root/--target-root, or --control-tables with --target-tables",
        ))
    }

    /// Config file values overlaid with any flags given on the command line
    pub fn comparison_config(&self) -> Result<ComparisonConfig> {
        let mut config = match &self.config {
            Some(path) => ComparisonConfig::from_json_file(path)?,
            None => ComparisonConfig::default(),
        };

        if let Some(precision) = self.compare_precision {
            config = config.with_precision(precision);
        }
        if let Some(tolerance) = self.row_diff_tolerance {
            config = config.with_row_diff_tolerance(tolerance);
        }
        if let Some(rows) = self.preview_rows {
            config = config.with_preview_rows(rows);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            memory_limit: self.memory_limit.clone(),
            threads: self.threads,
        }
    }
}

/// Parse and range-check a row diff tolerance
fn parse_tolerance(s: &str) -> std::result::Result<f64, String> {
    let tolerance: f64 = s
        .parse()
        .map_err(|_| format!("Invalid tolerance: '{}'. Must be a number between 0 and 1.", s))?;
    validate_tolerance(tolerance)
}

/// Parse and range-check a compare precision
fn parse_precision(s: &str) -> std::result::Result<u32, String> {
    let precision: u32 = s
        .parse()
        .map_err(|_| format!("Invalid precision: '{}'. Must be a non-negative integer.", s))?;
    validate_precision(precision)
}
