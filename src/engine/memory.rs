//! In-memory hash-set execution engine for small datasets

use super::{DatasetLoader, ExecutionEngine, RowPreview, Subtraction};
use crate::error::{CompareError, Result};
use crate::schema::{Column, DataType, Schema};
use crate::source::TableSource;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Text(String),
    List(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn float(v: f64) -> Self {
        Self::Float(OrderedFloat(v))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Text representation used by casts and previews; `None` for null
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.render_inner()),
        }
    }

    fn render_inner(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(f.0),
            Self::Text(s) => s.clone(),
            Self::List(items) => format!(
                "[{}]",
                items.iter().map(|v| v.render_inner()).collect::<Vec<_>>().join(", ")
            ),
            Self::Struct(fields) => format!(
                "{{{}}}",
                fields.iter().map(|(_, v)| v.render_inner()).collect::<Vec<_>>().join(", ")
            ),
            Self::Map(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{} -> {}", k.render_inner(), v.render_inner()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

/// Round half away from zero to `precision` decimal places
pub fn round_half_away(v: f64, precision: u32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let exponent = i32::try_from(precision).unwrap_or(i32::MAX);
    let factor = 10f64.powi(exponent);
    let scaled = v * factor;
    if !scaled.is_finite() {
        return v;
    }
    scaled.round() / factor
}

/// Rows plus schema, shared cheaply between derived datasets
#[derive(Debug, Clone)]
pub struct MemoryTable {
    id: u64,
    schema: Schema,
    rows: Arc<Vec<Vec<Value>>>,
}

impl MemoryTable {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Engine that evaluates every operation with hash sets in process memory
#[derive(Debug, Default)]
pub struct MemoryEngine {
    next_id: AtomicU64,
    pinned: Mutex<HashSet<u64>>,
    catalog: Mutex<HashMap<String, MemoryTable>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table with this engine
    pub fn table(&self, schema: Schema, rows: Vec<Vec<Value>>) -> MemoryTable {
        debug_assert!(rows.iter().all(|r| r.len() == schema.len()));
        self.derive(schema, rows)
    }

    /// Make a table loadable by catalog name
    pub fn register(&self, name: impl Into<String>, table: MemoryTable) -> Result<()> {
        self.catalog
            .lock()
            .map_err(|_| CompareError::engine("catalog lock poisoned"))?
            .insert(name.into(), table);
        Ok(())
    }

    /// Number of datasets currently pinned
    pub fn pinned_count(&self) -> usize {
        self.pinned.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn derive(&self, schema: Schema, rows: Vec<Vec<Value>>) -> MemoryTable {
        MemoryTable {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            schema,
            rows: Arc::new(rows),
        }
    }

    fn map_column<'a>(schema: &'a Schema) -> Option<&'a Column> {
        schema.columns.iter().find(|c| c.data_type.contains_map())
    }
}

impl ExecutionEngine for MemoryEngine {
    type Dataset = MemoryTable;

    fn schema(&self, dataset: &MemoryTable) -> Result<Schema> {
        Ok(dataset.schema.clone())
    }

    fn count(&self, dataset: &MemoryTable) -> Result<u64> {
        Ok(dataset.rows.len() as u64)
    }

    fn round_columns(
        &self,
        dataset: &MemoryTable,
        columns: &[String],
        precision: u32,
    ) -> Result<MemoryTable> {
        let mut indexes = Vec::with_capacity(columns.len());
        for name in columns {
            let index = dataset
                .schema
                .columns
                .iter()
                .position(|c| &c.name == name)
                .ok_or_else(|| CompareError::engine(format!("Unknown column '{}'", name)))?;
            indexes.push(index);
        }

        let rows = dataset
            .rows
            .par_iter()
            .map(|row| {
                let mut row = row.clone();
                for &i in &indexes {
                    if let Value::Float(f) = row[i] {
                        row[i] = Value::float(round_half_away(f.0, precision));
                    }
                }
                row
            })
            .collect();

        Ok(self.derive(dataset.schema.clone(), rows))
    }

    fn cast_to_text(&self, dataset: &MemoryTable) -> Result<MemoryTable> {
        let schema = Schema::new(
            dataset
                .schema
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), DataType::Varchar))
                .collect(),
        );
        let rows = dataset
            .rows
            .par_iter()
            .map(|row| {
                row.iter()
                    .map(|v| v.render().map(Value::Text).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(self.derive(schema, rows))
    }

    fn subtract(
        &self,
        left: &MemoryTable,
        right: &MemoryTable,
    ) -> Result<Subtraction<MemoryTable>> {
        if left.schema.len() != right.schema.len() {
            return Err(CompareError::engine(format!(
                "Cannot subtract datasets with {} and {} columns",
                left.schema.len(),
                right.schema.len()
            )));
        }
        for schema in [&left.schema, &right.schema] {
            if let Some(column) = Self::map_column(schema) {
                return Ok(Subtraction::Unsupported {
                    reason: format!(
                        "column '{}' of type {} has no defined equality",
                        column.name, column.data_type
                    ),
                });
            }
        }

        let present: HashSet<&Vec<Value>> = right.rows.iter().collect();
        let mut seen: HashSet<&Vec<Value>> = HashSet::new();
        let rows = left
            .rows
            .iter()
            .filter(|row| !present.contains(*row) && seen.insert(*row))
            .cloned()
            .collect();

        Ok(Subtraction::Supported(self.derive(left.schema.clone(), rows)))
    }

    fn group_count(&self, dataset: &MemoryTable) -> Result<MemoryTable> {
        if let Some(column) = Self::map_column(&dataset.schema) {
            return Err(CompareError::engine(format!(
                "cannot group by column '{}' of type {}",
                column.name, column.data_type
            )));
        }

        let mut groups: IndexMap<&Vec<Value>, i64> = IndexMap::new();
        for row in dataset.rows.iter() {
            *groups.entry(row).or_insert(0) += 1;
        }

        let count_column = dataset.schema.unique_column_name(crate::COUNT_COLUMN);
        let mut columns = dataset.schema.columns.clone();
        columns.push(Column::new(count_column, DataType::BigInt));

        let rows = groups
            .into_iter()
            .map(|(row, n)| {
                let mut row = row.clone();
                row.push(Value::Int(n));
                row
            })
            .collect();

        Ok(self.derive(Schema::new(columns), rows))
    }

    fn preview(&self, dataset: &MemoryTable, limit: usize) -> Result<RowPreview> {
        let names = dataset
            .schema
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut preview = RowPreview::new(names);
        for row in dataset.rows.iter().take(limit) {
            preview.push_row(row.iter().map(Value::render).collect());
        }
        Ok(preview)
    }

    fn persist(&self, dataset: &MemoryTable) -> Result<MemoryTable> {
        let cached = MemoryTable {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            schema: dataset.schema.clone(),
            rows: Arc::clone(&dataset.rows),
        };
        self.pinned
            .lock()
            .map_err(|_| CompareError::engine("pin registry lock poisoned"))?
            .insert(cached.id);
        Ok(cached)
    }

    fn unpersist(&self, dataset: &MemoryTable) -> Result<()> {
        // Derived tables hold nothing beyond their shared rows
        self.pinned
            .lock()
            .map_err(|_| CompareError::engine("pin registry lock poisoned"))?
            .remove(&dataset.id);
        Ok(())
    }
}

impl DatasetLoader for MemoryEngine {
    fn load(&self, source: &TableSource) -> Result<MemoryTable> {
        match source {
            TableSource::Catalog { name } => self
                .catalog
                .lock()
                .map_err(|_| CompareError::engine("catalog lock poisoned"))?
                .get(name)
                .cloned()
                .ok_or_else(|| CompareError::invalid_input(format!("Table not found: {}", name))),
            TableSource::Path { .. } => Err(CompareError::invalid_input(format!(
                "The in-memory engine cannot read files: {}",
                source
            ))),
        }
    }
}
