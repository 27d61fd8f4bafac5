//! # pipecompare
//!
//! Reconciles a target tabular dataset against a control dataset: schemas
//! must match exactly, fractional columns can be rounded first, and the
//! rows of each side are subtracted from the other. Tables that cannot be
//! compared natively are retried with every column cast to text, and a row
//! count mismatch triggers a duplicate-aware comparison over
//! (row, multiplicity) pairs.

pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod reconcile;
pub mod schema;
pub mod source;

pub use compare::{compare, compare_pairs, Comparator, DiffResult, PairOutcome, PairStatus, Stage};
pub use config::{ComparisonConfig, EngineSettings};
pub use engine::{DatasetLoader, ExecutionEngine, PinSet, RowPreview, Subtraction};
pub use error::{CompareError, Result};
pub use reconcile::{DuplicateDiff, SubtractStrategy};
pub use schema::{Column, DataType, Schema};
pub use source::{TableFormat, TablePair, TableSource};

/// Default number of rows kept in each difference preview
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Name of the per-group count column added by duplicate reconciliation
pub const COUNT_COLUMN: &str = "count";
