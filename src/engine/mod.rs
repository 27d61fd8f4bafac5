//! Execution engine capability consumed by the comparison core
//!
//! The core never scans rows itself. Every bulk operation (count, cast,
//! subtract, group) is issued against an [`ExecutionEngine`], which may be
//! the in-memory hash-set backend or DuckDB.

pub mod duckdb;
pub mod memory;

use crate::error::Result;
use crate::schema::Schema;
use crate::source::TableSource;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use self::duckdb::DuckDbEngine;
pub use self::memory::{MemoryEngine, MemoryTable, Value};

/// Outcome of a set subtraction request
#[derive(Debug, Clone)]
pub enum Subtraction<D> {
    /// Rows of the left operand absent from the right operand
    Supported(D),
    /// The engine cannot compare rows of this schema natively
    Unsupported { reason: String },
}

/// Bulk relational operations over engine-owned datasets
pub trait ExecutionEngine {
    type Dataset: Clone;

    /// Schema of a dataset; must not scan rows
    fn schema(&self, dataset: &Self::Dataset) -> Result<Schema>;

    fn count(&self, dataset: &Self::Dataset) -> Result<u64>;

    /// Round the named columns to `precision` decimal places, leaving others untouched
    fn round_columns(
        &self,
        dataset: &Self::Dataset,
        columns: &[String],
        precision: u32,
    ) -> Result<Self::Dataset>;

    /// Cast every column to its text representation
    fn cast_to_text(&self, dataset: &Self::Dataset) -> Result<Self::Dataset>;

    /// Distinct rows of `left` not present in `right` (full-row equality)
    fn subtract(
        &self,
        left: &Self::Dataset,
        right: &Self::Dataset,
    ) -> Result<Subtraction<Self::Dataset>>;

    /// Group by all columns and append a per-group row count column
    fn group_count(&self, dataset: &Self::Dataset) -> Result<Self::Dataset>;

    /// At most `limit` rows, rendered as text
    fn preview(&self, dataset: &Self::Dataset, limit: usize) -> Result<RowPreview>;

    /// Pin a dataset in engine memory; the returned handle must be released with `unpersist`
    fn persist(&self, dataset: &Self::Dataset) -> Result<Self::Dataset>;

    /// Release whatever engine-side resources a handle holds (a cached copy or a derived relation)
    fn unpersist(&self, dataset: &Self::Dataset) -> Result<()>;
}

/// Engines that can resolve table identifiers into datasets
pub trait DatasetLoader: ExecutionEngine {
    fn load(&self, source: &TableSource) -> Result<Self::Dataset>;
}

/// Bounded sample of rows kept for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowPreview {
    pub columns: Vec<String>,
    pub rows: Vec<IndexMap<String, Option<String>>>,
}

impl RowPreview {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; values are matched to columns by position
    pub fn push_row(&mut self, values: Vec<Option<String>>) {
        let row = self.columns.iter().cloned().zip(values).collect();
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Datasets held for the duration of one comparison call
///
/// Everything pinned or tracked through this set is released in reverse
/// order when it is dropped, so early returns and errors cannot leak
/// engine memory.
pub struct PinSet<'e, E: ExecutionEngine> {
    engine: &'e E,
    pinned: Vec<E::Dataset>,
}

impl<'e, E: ExecutionEngine> PinSet<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self {
            engine,
            pinned: Vec::new(),
        }
    }

    /// Persist a dataset and remember it for release
    pub fn pin(&mut self, dataset: &E::Dataset) -> Result<E::Dataset> {
        let cached = self.engine.persist(dataset)?;
        self.pinned.push(cached.clone());
        Ok(cached)
    }

    /// Take ownership of a derived dataset so it is released with the set
    pub fn track(&mut self, dataset: E::Dataset) -> E::Dataset {
        self.pinned.push(dataset.clone());
        dataset
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

impl<E: ExecutionEngine> Drop for PinSet<'_, E> {
    fn drop(&mut self) {
        while let Some(dataset) = self.pinned.pop() {
            if let Err(e) = self.engine.unpersist(&dataset) {
                log::warn!("Failed to release cached dataset: {}", e);
            }
        }
    }
}
