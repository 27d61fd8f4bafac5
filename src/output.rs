//! Output formatting utilities

use crate::compare::{DiffResult, PairOutcome, PairStatus};
use crate::engine::RowPreview;
use crate::error::{CompareError, Result};
use crate::reconcile::{DuplicateDiff, SubtractStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Cells longer than this are cut short when rendering previews
const MAX_CELL_WIDTH: usize = 20;

/// Pretty printer for comparison output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print one pair's outcome
    pub fn print_outcome(outcome: &PairOutcome) {
        match &outcome.status {
            PairStatus::Passed(result) => {
                println!("🔍 {}", outcome.pair);
                Self::print_diff_result(result);
            }
            PairStatus::Failed(err) => {
                println!("🔍 {}", outcome.pair);
                Self::print_failure(err);
            }
            PairStatus::Skipped => {
                println!("⏭️  {} (skipped)", outcome.pair);
            }
        }
        println!();
    }

    /// Print a completed comparison
    pub fn print_diff_result(result: &DiffResult) {
        if !result.rounded_columns.is_empty() {
            println!("├─ Rounded: {}", result.rounded_columns.join(", "));
        }
        if result.strategy == SubtractStrategy::TextFallback {
            println!("├─ ⚠️  Compared with all columns cast to strings");
        }
        println!(
            "├─ Rows: {} control, {} target",
            result.control_count, result.target_count
        );

        if result.new_row_count > 0 {
            println!("├─ Found {} rows that were not in the control", result.new_row_count);
            print!("{}", render_table(&result.new_rows));
        }
        if result.missing_row_count > 0 {
            println!("├─ Found {} rows missing from the target", result.missing_row_count);
            print!("{}", render_table(&result.missing_rows));
        }

        if let Some(dup) = &result.duplicate_diff {
            println!("├─ ⚠️  Counts do not match!");
            Self::print_duplicate_diff(dup);
        }

        if result.passed {
            println!("└─ ✅ Passed");
        } else {
            println!("└─ ❌ Failed");
        }
    }

    fn print_duplicate_diff(dup: &DuplicateDiff) {
        if dup.new_row_count > 0 {
            println!(
                "│  ├─ {} grouped rows in target not in control ({})",
                dup.new_row_count, dup.count_column
            );
            print!("{}", render_table(&dup.new_rows));
        }
        if dup.missing_row_count > 0 {
            println!(
                "│  └─ {} grouped rows in control not in target ({})",
                dup.missing_row_count, dup.count_column
            );
            print!("{}", render_table(&dup.missing_rows));
        }
    }

    /// Print a failure with whatever diagnostics it carries
    pub fn print_failure(err: &CompareError) {
        if let Some(result) = err.diff_result() {
            Self::print_diff_result(result);
        }
        match err.root() {
            CompareError::SchemaMismatch { control, target } => {
                println!("├─ ❌ Schema: mismatch");
                println!("│  control:");
                for line in control.describe().lines() {
                    println!("│  {}", line);
                }
                println!("│  target:");
                for line in target.describe().lines() {
                    println!("│  {}", line);
                }
                println!("└─ ❌ Failed");
            }
            root => println!("└─ ❌ {}", root),
        }
    }

    /// Print a one-line summary of a batch
    pub fn print_summary(outcomes: &[PairOutcome]) {
        let passed = outcomes.iter().filter(|o| o.passed()).count();
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o.status, PairStatus::Skipped))
            .count();
        let failed = outcomes.len() - passed - skipped;

        println!("📊 Summary");
        println!("├─ Passed: {}", passed);
        if skipped > 0 {
            println!("├─ Skipped: {}", skipped);
        }
        println!("└─ Failed: {}", failed);
    }
}

/// Render a preview as a bordered table, right-aligned, like a dataframe `show()`
pub fn render_table(preview: &RowPreview) -> String {
    if preview.columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = preview
        .rows
        .iter()
        .map(|row| {
            preview
                .columns
                .iter()
                .map(|c| truncate_cell(row.get(c).cloned().flatten().as_deref()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = preview
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separator = format!(
        "+{}+\n",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("+")
    );
    let line = |values: &[String]| {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:>width$}", v, width = w))
            .collect();
        format!("|{}|\n", padded.join("|"))
    };

    let mut out = separator.clone();
    out.push_str(&line(&preview.columns));
    out.push_str(&separator);
    for row in &cells {
        out.push_str(&line(row));
    }
    out.push_str(&separator);
    out
}

fn truncate_cell(value: Option<&str>) -> String {
    let value = value.unwrap_or("null");
    if value.chars().count() > MAX_CELL_WIDTH {
        let head: String = value.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

/// Machine-readable summary of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub passed: bool,
    pub pairs: Vec<PairReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    pub control: String,
    pub target: String,
    /// One of `passed`, `failed`, `skipped`
    pub status: String,
    pub result: Option<DiffResult>,
    pub error: Option<String>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: &[PairOutcome]) -> Self {
        let pairs = outcomes
            .iter()
            .map(|outcome| {
                let status = match outcome.status {
                    PairStatus::Passed(_) => "passed",
                    PairStatus::Failed(_) => "failed",
                    PairStatus::Skipped => "skipped",
                };
                PairReport {
                    control: outcome.pair.control.to_string(),
                    target: outcome.pair.target.to_string(),
                    status: status.to_string(),
                    result: outcome.result().cloned(),
                    error: outcome.error().map(|e| e.root().to_string()),
                }
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            passed: outcomes.iter().all(|o| o.passed()),
            pairs,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, JsonFormatter::format(self)?)?;
        Ok(())
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}
