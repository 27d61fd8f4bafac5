//! DuckDB-backed execution engine
//!
//! Datasets are named relations inside one connection. Derivations (rounding,
//! casting, subtraction, grouping) are temporary views, so DuckDB binds them
//! eagerly and reports unsupported operations at creation time. Persisting
//! materializes a relation into a temporary table.

use super::{DatasetLoader, ExecutionEngine, RowPreview, Subtraction};
use crate::config::EngineSettings;
use crate::error::{CompareError, Result};
use crate::schema::{Column, DataType, Schema};
use crate::source::{TableFormat, TableSource};
use ::duckdb::Connection;
use std::path::Path;
use uuid::Uuid;

/// How a relation is stored, which decides how it is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    View,
    Table,
}

/// Handle to a named relation in the engine's connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuckRelation {
    name: String,
    kind: RelationKind,
}

impl DuckRelation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    fn quoted(&self) -> String {
        quote_ident(&self.name)
    }
}

/// Execution engine running every bulk operation through DuckDB
pub struct DuckDbEngine {
    connection: Connection,
}

impl DuckDbEngine {
    /// Open a transient in-memory database
    pub fn open_in_memory(settings: &EngineSettings) -> Result<Self> {
        Self::configure(Connection::open_in_memory()?, settings)
    }

    /// Open a database file whose tables can be compared by catalog name
    pub fn open(path: &Path, settings: &EngineSettings) -> Result<Self> {
        if !path.exists() {
            return Err(CompareError::invalid_input(format!(
                "Database file not found: {}",
                path.display()
            )));
        }
        Self::configure(Connection::open(path)?, settings)
    }

    fn configure(connection: Connection, settings: &EngineSettings) -> Result<Self> {
        for statement in settings.statements() {
            connection.execute(&statement, [])?;
        }
        Ok(Self { connection })
    }

    /// Raw connection, for callers that need to stage tables directly
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn fresh_name(prefix: &str) -> String {
        format!("__pc_{}_{}", prefix, Uuid::new_v4().simple())
    }

    fn create_view(&self, prefix: &str, select: &str) -> Result<DuckRelation> {
        let relation = DuckRelation {
            name: Self::fresh_name(prefix),
            kind: RelationKind::View,
        };
        let sql = format!("CREATE TEMP VIEW {} AS {}", relation.quoted(), select);
        log::debug!("{}", sql);
        self.connection.execute(&sql, [])?;
        Ok(relation)
    }

    /// Project every column of a relation through `expr(quoted_name, column)`
    fn project<F>(&self, prefix: &str, relation: &DuckRelation, expr: F) -> Result<DuckRelation>
    where
        F: Fn(&str, &Column) -> String,
    {
        let schema = self.schema(relation)?;
        if schema.is_empty() {
            return Err(CompareError::engine(format!(
                "Relation '{}' has no columns",
                relation.name
            )));
        }
        let select_list = schema
            .columns
            .iter()
            .map(|column| {
                let quoted = quote_ident(&column.name);
                format!("{} AS {}", expr(&quoted, column), quoted)
            })
            .collect::<Vec<_>>()
            .join(", ");
        self.create_view(
            prefix,
            &format!("SELECT {} FROM {}", select_list, relation.quoted()),
        )
    }

    fn source_select(source: &TableSource) -> Result<String> {
        match source {
            TableSource::Catalog { name } => {
                let qualified = name
                    .split('.')
                    .map(quote_ident)
                    .collect::<Vec<_>>()
                    .join(".");
                Ok(format!("SELECT * FROM {}", qualified))
            }
            TableSource::Path {
                root,
                table,
                format,
            } => {
                let location = resolve_table_location(&root.join(table), *format)?;
                Ok(format!(
                    "SELECT * FROM {}({})",
                    format.reader_function(),
                    quote_literal(&location)
                ))
            }
        }
    }

    /// Convert DuckDB load errors to user-facing errors
    fn convert_load_error(error: ::duckdb::Error, source: &TableSource) -> CompareError {
        let error_msg = error.to_string();
        if error_msg.contains("does not exist") || error_msg.contains("No files found") {
            CompareError::invalid_input(format!("Table not found: {}", source))
        } else if error_msg.contains("Permission denied") {
            CompareError::invalid_input(format!("Permission denied reading table: {}", source))
        } else {
            CompareError::DuckDb(error)
        }
    }
}

impl ExecutionEngine for DuckDbEngine {
    type Dataset = DuckRelation;

    fn schema(&self, dataset: &DuckRelation) -> Result<Schema> {
        let mut stmt = self
            .connection
            .prepare(&format!("DESCRIBE {}", dataset.quoted()))?;
        let rows = stmt.query_map([], |row| {
            Ok(Column {
                name: row.get::<_, String>(0)?,
                data_type: DataType::parse(&row.get::<_, String>(1)?),
            })
        })?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(Schema::new(columns))
    }

    fn count(&self, dataset: &DuckRelation) -> Result<u64> {
        let count: u64 = self
            .connection
            .prepare(&format!("SELECT COUNT(*) FROM {}", dataset.quoted()))?
            .query_row([], |row| row.get(0))?;
        Ok(count)
    }

    fn round_columns(
        &self,
        dataset: &DuckRelation,
        columns: &[String],
        precision: u32,
    ) -> Result<DuckRelation> {
        self.project("rounded", dataset, |quoted, column| {
            if columns.contains(&column.name) {
                format!("round({}, {})", quoted, precision)
            } else {
                quoted.to_string()
            }
        })
    }

    fn cast_to_text(&self, dataset: &DuckRelation) -> Result<DuckRelation> {
        self.project("text", dataset, |quoted, _| {
            format!("CAST({} AS VARCHAR)", quoted)
        })
    }

    fn subtract(
        &self,
        left: &DuckRelation,
        right: &DuckRelation,
    ) -> Result<Subtraction<DuckRelation>> {
        // EXCEPT without ALL has set semantics: duplicates collapse
        let select = format!(
            "SELECT * FROM {} EXCEPT SELECT * FROM {}",
            left.quoted(),
            right.quoted()
        );
        match self.create_view("except", &select) {
            Ok(relation) => Ok(Subtraction::Supported(relation)),
            Err(CompareError::DuckDb(e)) if is_unsupported_comparison(&e.to_string()) => {
                Ok(Subtraction::Unsupported {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn group_count(&self, dataset: &DuckRelation) -> Result<DuckRelation> {
        let schema = self.schema(dataset)?;
        let count_column = schema.unique_column_name(crate::COUNT_COLUMN);
        self.create_view(
            "grouped",
            &format!(
                "SELECT *, COUNT(*) AS {} FROM {} GROUP BY ALL",
                quote_ident(&count_column),
                dataset.quoted()
            ),
        )
    }

    fn preview(&self, dataset: &DuckRelation, limit: usize) -> Result<RowPreview> {
        let schema = self.schema(dataset)?;
        let names: Vec<String> = schema
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut preview = RowPreview::new(names.clone());
        if names.is_empty() || limit == 0 {
            return Ok(preview);
        }

        let select_list = names
            .iter()
            .map(|n| format!("CAST({} AS VARCHAR)", quote_ident(n)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            select_list,
            dataset.quoted(),
            limit
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let column_count = names.len();
        let rows = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get::<_, Option<String>>(i)?);
            }
            Ok(values)
        })?;

        for row in rows {
            preview.push_row(row?);
        }
        Ok(preview)
    }

    fn persist(&self, dataset: &DuckRelation) -> Result<DuckRelation> {
        let relation = DuckRelation {
            name: Self::fresh_name("cached"),
            kind: RelationKind::Table,
        };
        let sql = format!(
            "CREATE TEMP TABLE {} AS SELECT * FROM {}",
            relation.quoted(),
            dataset.quoted()
        );
        log::debug!("{}", sql);
        self.connection.execute(&sql, [])?;
        Ok(relation)
    }

    fn unpersist(&self, dataset: &DuckRelation) -> Result<()> {
        let sql = match dataset.kind {
            RelationKind::View => format!("DROP VIEW IF EXISTS {}", dataset.quoted()),
            RelationKind::Table => format!("DROP TABLE IF EXISTS {}", dataset.quoted()),
        };
        self.connection.execute(&sql, [])?;
        Ok(())
    }
}

impl DatasetLoader for DuckDbEngine {
    fn load(&self, source: &TableSource) -> Result<DuckRelation> {
        let select = Self::source_select(source)?;
        self.create_view("source", &select).map_err(|e| match e {
            CompareError::DuckDb(inner) => Self::convert_load_error(inner, source),
            other => other,
        })
    }
}

/// Errors DuckDB raises when the rows of an `EXCEPT` cannot be compared.
///
/// Only binder and not-implemented errors qualify, and only when they name a
/// comparison: a type with no equality (`cannot compare`), no matching
/// comparison function (`no function matches`), or an operator that is
/// `not supported` for the column type. Anything else is a hard failure.
fn is_unsupported_comparison(message: &str) -> bool {
    let lower = message.to_lowercase();
    let classified = lower.contains("binder error") || lower.contains("not implemented error");
    classified
        && ["cannot compare", "no function matches", "not supported"]
            .iter()
            .any(|needle| lower.contains(needle))
}

/// Turn `root/table` into a path or glob DuckDB can scan
fn resolve_table_location(path: &Path, format: TableFormat) -> Result<String> {
    if path.is_dir() {
        return Ok(format!(
            "{}/**/*.{}",
            path.to_string_lossy().trim_end_matches('/'),
            format.extension()
        ));
    }
    if path.is_file() {
        return Ok(path.to_string_lossy().to_string());
    }
    let with_extension = path.with_extension(format.extension());
    if with_extension.is_file() {
        return Ok(with_extension.to_string_lossy().to_string());
    }
    Err(CompareError::invalid_input(format!(
        "Table not found: {}",
        path.display()
    )))
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
