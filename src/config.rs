//! Comparison and engine configuration

use crate::error::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Options recognized by a single comparison call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Decimal places for rounding fractional columns; `None` disables rounding
    pub precision: Option<u32>,
    /// Maximum fraction of changed rows, relative to the control row count
    pub row_diff_tolerance: f64,
    /// Upper bound on rows kept for diagnostic previews
    pub preview_rows: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            precision: None,
            row_diff_tolerance: 0.0,
            preview_rows: crate::DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl ComparisonConfig {
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_row_diff_tolerance(mut self, tolerance: f64) -> Self {
        self.row_diff_tolerance = tolerance;
        self
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CompareError::config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_tolerance(self.row_diff_tolerance).map_err(CompareError::config)?;
        if let Some(precision) = self.precision {
            validate_precision(precision).map_err(CompareError::config)?;
        }
        Ok(())
    }
}

/// Widest decimal scale DuckDB supports
pub const MAX_PRECISION: u32 = 38;

/// Precision must fit the engines' rounding range
pub fn validate_precision(precision: u32) -> std::result::Result<u32, String> {
    if precision > MAX_PRECISION {
        return Err(format!(
            "Compare precision must be at most {}, got {}",
            MAX_PRECISION, precision
        ));
    }
    Ok(precision)
}

/// Row-diff tolerance must be a fraction in [0, 1]
pub fn validate_tolerance(tolerance: f64) -> std::result::Result<f64, String> {
    if tolerance.is_nan() || !(0.0..=1.0).contains(&tolerance) {
        return Err(format!(
            "Row diff tolerance must be between 0 and 1, got {}",
            tolerance
        ));
    }
    Ok(tolerance)
}

/// Knobs applied to the DuckDB connection when it is opened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub memory_limit: Option<String>,
    pub threads: Option<usize>,
}

impl EngineSettings {
    /// `SET` statements for this configuration, in execution order
    pub fn statements(&self) -> Vec<String> {
        let mut statements = vec![
            "SET enable_progress_bar=false".to_string(),
            "SET preserve_insertion_order=false".to_string(),
        ];
        if let Some(limit) = &self.memory_limit {
            statements.push(format!("SET memory_limit='{}'", limit.replace('\'', "''")));
        }
        if let Some(threads) = self.threads {
            statements.push(format!("SET threads={}", threads));
        }
        statements
    }
}
