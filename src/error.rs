//! Error types for pipecompare operations

use crate::compare::DiffResult;
use crate::schema::Schema;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompareError>;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Control schema and target schema do not match\ncontrol:\n{}target:\n{}", control.describe(), target.describe())]
    SchemaMismatch { control: Schema, target: Schema },

    #[error("Set subtraction is not supported for this schema (typed: {typed}; text fallback: {fallback})")]
    UnsupportedSubtraction { typed: String, fallback: String },

    #[error(
        "Data differs in table by more than {}%, failing ({changed} changed rows, {control_count} control rows, tolerance {tolerance})",
        100.0 * tolerance
    )]
    ToleranceExceeded {
        changed: u64,
        control_count: u64,
        tolerance: f64,
        diff: Box<DiffResult>,
    },

    #[error("Data counts differ but {source} prevents grouping comparison")]
    GroupingUnsupported { source: Box<CompareError> },

    #[error("Execution engine error: {message}")]
    Engine { message: String },

    #[error("Comparison of '{control}' against '{target}' failed: {source}")]
    Pair {
        control: String,
        target: String,
        source: Box<CompareError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl CompareError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn grouping_unsupported(cause: CompareError) -> Self {
        Self::GroupingUnsupported {
            source: Box::new(cause),
        }
    }

    /// Attach table identifiers to a failure from a batch run.
    pub fn for_pair(self, control: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Pair {
            control: control.into(),
            target: target.into(),
            source: Box::new(self),
        }
    }

    /// The partially populated result, for failures that happen after the set diff ran.
    pub fn diff_result(&self) -> Option<&DiffResult> {
        match self {
            Self::ToleranceExceeded { diff, .. } => Some(diff),
            Self::Pair { source, .. } => source.diff_result(),
            _ => None,
        }
    }

    /// Strip any batch context and return the underlying failure.
    pub fn root(&self) -> &CompareError {
        match self {
            Self::Pair { source, .. } => source.root(),
            other => other,
        }
    }
}
