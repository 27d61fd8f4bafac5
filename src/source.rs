//! Table identifiers and control/target pairing

use crate::error::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// On-disk format of a path-addressed table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Parquet,
    Csv,
    Json,
}

impl TableFormat {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid table format: {}. Use 'parquet', 'csv', or 'json'",
                s
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// DuckDB table function that scans this format
    pub fn reader_function(&self) -> &'static str {
        match self {
            Self::Parquet => "read_parquet",
            Self::Csv => "read_csv_auto",
            Self::Json => "read_json_auto",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Where a dataset comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TableSource {
    /// `root/table` read with the given format
    Path {
        root: PathBuf,
        table: String,
        format: TableFormat,
    },
    /// A table registered in the engine's catalog
    Catalog { name: String },
}

impl TableSource {
    pub fn path(root: impl AsRef<Path>, table: impl Into<String>, format: TableFormat) -> Self {
        Self::Path {
            root: root.as_ref().to_path_buf(),
            table: table.into(),
            format,
        }
    }

    pub fn catalog(name: impl Into<String>) -> Self {
        Self::Catalog { name: name.into() }
    }
}

impl fmt::Display for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path {
                root,
                table,
                format,
            } => write!(f, "{} ({})", root.join(table).display(), format),
            Self::Catalog { name } => write!(f, "{}", name),
        }
    }
}

/// One control/target comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePair {
    pub control: TableSource,
    pub target: TableSource,
}

impl TablePair {
    pub fn new(control: TableSource, target: TableSource) -> Self {
        Self { control, target }
    }

    /// Same table names under two root directories
    pub fn from_roots(
        tables: &[String],
        control_root: &Path,
        target_root: &Path,
        format: TableFormat,
    ) -> Vec<Self> {
        tables
            .iter()
            .map(|table| {
                Self::new(
                    TableSource::path(control_root, table.clone(), format),
                    TableSource::path(target_root, table.clone(), format),
                )
            })
            .collect()
    }

    /// Catalog tables paired by position
    pub fn from_catalog(control_tables: &[String], target_tables: &[String]) -> Result<Vec<Self>> {
        if control_tables.len() != target_tables.len() {
            return Err(CompareError::invalid_input(format!(
                "Got {} control tables but {} target tables",
                control_tables.len(),
                target_tables.len()
            )));
        }
        Ok(control_tables
            .iter()
            .zip(target_tables)
            .map(|(c, t)| Self::new(TableSource::catalog(c.clone()), TableSource::catalog(t.clone())))
            .collect())
    }
}

impl fmt::Display for TablePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.control, self.target)
    }
}
