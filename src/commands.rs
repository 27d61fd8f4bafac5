//! Command implementation for the pipecompare CLI

use crate::cli::Cli;
use anyhow::Context;
use crate::compare::compare_pairs;
use crate::engine::DuckDbEngine;
use crate::error::Result;
use crate::output::{BatchReport, PrettyPrinter};
use crate::progress::{ProgressReporter, StageObserver};

/// Run every comparison named on the command line.
///
/// Returns `Ok(true)` when every pair passed. Per-pair failures are reported
/// and folded into the return value; only setup problems surface as `Err`.
pub fn execute(cli: &Cli) -> Result<bool> {
    let pairs = cli.table_pairs()?;
    let config = cli.comparison_config()?;
    let settings = cli.engine_settings();

    let engine = match &cli.database {
        Some(path) => {
            log::debug!("Opening database {}", path.display());
            DuckDbEngine::open(path, &settings)?
        }
        None => DuckDbEngine::open_in_memory(&settings)?,
    };

    log::info!("Comparing {} table pair(s)", pairs.len());
    let outcomes = {
        let reporter = if cli.no_progress {
            ProgressReporter::new_minimal()
        } else {
            ProgressReporter::new_for_comparison()
        };
        compare_pairs(
            &engine,
            &pairs,
            &config,
            cli.fail_fast,
            Some(&reporter as &dyn StageObserver),
        )
    };

    for outcome in &outcomes {
        PrettyPrinter::print_outcome(outcome);
    }
    PrettyPrinter::print_summary(&outcomes);

    let report = BatchReport::from_outcomes(&outcomes);
    if let Some(path) = &cli.report {
        report
            .write_to(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("📄 Report written to {}", path.display());
    }

    Ok(report.passed)
}
