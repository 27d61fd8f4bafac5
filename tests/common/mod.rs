//! Common test utilities and helpers

use pipecompare::engine::{MemoryEngine, MemoryTable};
use pipecompare::{
    CompareError, DatasetLoader, ExecutionEngine, Result, RowPreview, Schema, Subtraction,
    TableSource,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Test fixture manager for creating temporary test environments
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Get the root path of the test fixture
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a CSV file at a path relative to the fixture root, creating parents
    pub fn create_csv(&self, relative: &str, data: &[Vec<&str>]) -> Result<PathBuf> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = String::new();
        for row in data {
            content.push_str(&row.join(","));
            content.push('\n');
        }

        fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a DuckDB database file populated by `sql`
    pub fn create_database(&self, name: &str, sql: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        let connection = duckdb::Connection::open(&path)?;
        connection.execute_batch(sql)?;
        Ok(path)
    }

    pub fn path_str(&self, relative: &str) -> String {
        self.root().join(relative).to_string_lossy().to_string()
    }
}

/// Helper for running CLI commands in tests
pub struct CliTestRunner {
    fixture: TestFixture,
}

impl CliTestRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fixture: TestFixture::new()?,
        })
    }

    pub fn fixture(&self) -> &TestFixture {
        &self.fixture
    }

    /// Run pipecompare with the spinner disabled and return whether every pair passed
    pub fn run_command(&self, args: &[&str]) -> Result<bool> {
        use clap::Parser;
        use pipecompare::cli::Cli;
        use pipecompare::commands::execute;

        let mut cmd_args = vec!["pipecompare", "--no-progress"];
        cmd_args.extend(args);

        let cli = Cli::try_parse_from(cmd_args)
            .map_err(|e| CompareError::invalid_input(e.to_string()))?;
        execute(&cli)
    }

    pub fn expect_pass(&self, args: &[&str]) {
        assert!(
            self.run_command(args).expect("Command should run"),
            "Every pair should pass"
        );
    }

    pub fn expect_mismatch(&self, args: &[&str]) {
        assert!(
            !self.run_command(args).expect("Command should run"),
            "At least one pair should fail"
        );
    }

    pub fn expect_error(&self, args: &[&str]) -> CompareError {
        self.run_command(args).expect_err("Command should fail to run")
    }
}

/// Failures a [`FaultyEngine`] injects
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Every typed subtraction reports Unsupported
    pub unsupported_typed: bool,
    /// Text casting fails
    pub fail_cast: bool,
    /// Text subtraction also reports Unsupported
    pub unsupported_text: bool,
    /// Grouping fails
    pub fail_grouping: bool,
}

/// Memory engine wrapper that injects faults and counts row scans
pub struct FaultyEngine {
    pub inner: MemoryEngine,
    pub faults: Faults,
    row_scans: AtomicUsize,
}

impl FaultyEngine {
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: MemoryEngine::new(),
            faults,
            row_scans: AtomicUsize::new(0),
        }
    }

    /// Operations that had to read rows (everything except schema lookups)
    pub fn row_scans(&self) -> usize {
        self.row_scans.load(Ordering::SeqCst)
    }

    fn scan(&self) {
        self.row_scans.fetch_add(1, Ordering::SeqCst);
    }

    fn is_text(table: &MemoryTable) -> bool {
        table
            .schema()
            .columns
            .iter()
            .all(|c| c.data_type == pipecompare::DataType::Varchar)
    }
}

impl ExecutionEngine for FaultyEngine {
    type Dataset = MemoryTable;

    fn schema(&self, dataset: &MemoryTable) -> Result<Schema> {
        self.inner.schema(dataset)
    }

    fn count(&self, dataset: &MemoryTable) -> Result<u64> {
        self.scan();
        self.inner.count(dataset)
    }

    fn round_columns(&self, dataset: &MemoryTable, columns: &[String], precision: u32) -> Result<MemoryTable> {
        self.scan();
        self.inner.round_columns(dataset, columns, precision)
    }

    fn cast_to_text(&self, dataset: &MemoryTable) -> Result<MemoryTable> {
        self.scan();
        if self.faults.fail_cast {
            return Err(CompareError::engine("cannot cast column to text"));
        }
        self.inner.cast_to_text(dataset)
    }

    fn subtract(&self, left: &MemoryTable, right: &MemoryTable) -> Result<Subtraction<MemoryTable>> {
        self.scan();
        let text = Self::is_text(left);
        if (!text && self.faults.unsupported_typed) || (text && self.faults.unsupported_text) {
            return Ok(Subtraction::Unsupported {
                reason: "injected: subtraction not supported".to_string(),
            });
        }
        self.inner.subtract(left, right)
    }

    fn group_count(&self, dataset: &MemoryTable) -> Result<MemoryTable> {
        self.scan();
        if self.faults.fail_grouping {
            return Err(CompareError::engine("injected: cannot group"));
        }
        self.inner.group_count(dataset)
    }

    fn preview(&self, dataset: &MemoryTable, limit: usize) -> Result<RowPreview> {
        self.scan();
        self.inner.preview(dataset, limit)
    }

    fn persist(&self, dataset: &MemoryTable) -> Result<MemoryTable> {
        self.scan();
        self.inner.persist(dataset)
    }

    fn unpersist(&self, dataset: &MemoryTable) -> Result<()> {
        self.inner.unpersist(dataset)
    }
}

impl DatasetLoader for FaultyEngine {
    fn load(&self, source: &TableSource) -> Result<MemoryTable> {
        self.inner.load(source)
    }
}

/// Sample table builders
pub mod sample_data {
    use pipecompare::engine::{MemoryEngine, MemoryTable, Value};
    use pipecompare::{Column, DataType, Schema};

    pub fn id_name_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
        ])
    }

    /// (id INTEGER, name VARCHAR) table
    pub fn id_name(engine: &MemoryEngine, rows: &[(i64, &str)]) -> MemoryTable {
        engine.table(
            id_name_schema(),
            rows.iter()
                .map(|(id, name)| vec![Value::Int(*id), Value::text(*name)])
                .collect(),
        )
    }

    /// (id INTEGER, amount DOUBLE) table
    pub fn amounts(engine: &MemoryEngine, rows: &[(i64, f64)]) -> MemoryTable {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("amount", DataType::Double),
        ]);
        engine.table(
            schema,
            rows.iter()
                .map(|(id, amount)| vec![Value::Int(*id), Value::float(*amount)])
                .collect(),
        )
    }

    /// (id INTEGER, attrs MAP(VARCHAR, INTEGER)) table
    pub fn attrs(engine: &MemoryEngine, rows: &[(i64, i64)]) -> MemoryTable {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("attrs", DataType::parse("MAP(VARCHAR, INTEGER)")),
        ]);
        engine.table(
            schema,
            rows.iter()
                .map(|(id, v)| {
                    vec![
                        Value::Int(*id),
                        Value::Map(vec![(Value::text("k"), Value::Int(*v))]),
                    ]
                })
                .collect(),
        )
    }
}

/// Cell of a preview row, `None` for SQL NULL
pub fn cell(preview: &RowPreview, row: usize, column: &str) -> Option<String> {
    preview.rows[row].get(column).cloned().flatten()
}
