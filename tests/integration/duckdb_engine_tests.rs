//! Comparisons executed by DuckDB

use crate::common::{cell, TestFixture};
use pipecompare::compare::compare_pairs;
use pipecompare::engine::duckdb::DuckRelation;
use pipecompare::engine::DuckDbEngine;
use pipecompare::{
    compare, CompareError, ComparisonConfig, DatasetLoader, EngineSettings, SubtractStrategy,
    TableFormat, TablePair, TableSource,
};

fn engine_with(sql: &str) -> DuckDbEngine {
    let engine = DuckDbEngine::open_in_memory(&EngineSettings::default()).unwrap();
    engine.connection().execute_batch(sql).unwrap();
    engine
}

/// Helper relations the engine created and has not dropped yet
fn leftover_relations(engine: &DuckDbEngine) -> i64 {
    let sql = "SELECT
        (SELECT COUNT(*) FROM duckdb_views() WHERE starts_with(view_name, '__pc_'))
      + (SELECT COUNT(*) FROM duckdb_tables() WHERE starts_with(table_name, '__pc_'))";
    engine
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .unwrap()
}

fn load_pair(engine: &DuckDbEngine, control: &str, target: &str) -> (DuckRelation, DuckRelation) {
    (
        engine.load(&TableSource::catalog(control)).unwrap(),
        engine.load(&TableSource::catalog(target)).unwrap(),
    )
}

#[test]
fn test_identical_catalog_tables() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT * FROM (VALUES (1, 'a'), (2, 'b')) t(id, name);
         CREATE TABLE t AS SELECT * FROM (VALUES (2, 'b'), (1, 'a')) t(id, name);",
    );
    let (control, target) = load_pair(&engine, "c", "t");

    let result = compare(&engine, &control, &target, &ComparisonConfig::default()).unwrap();
    assert!(result.passed);
    assert_eq!(result.control_count, 2);
    assert_eq!(result.changed_rows(), 0);
}

#[test]
fn test_changed_row_is_previewed() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT * FROM (VALUES (1, 'a'), (2, 'b')) t(id, name);
         CREATE TABLE t AS SELECT * FROM (VALUES (1, 'a'), (2, 'c')) t(id, name);",
    );
    let (control, target) = load_pair(&engine, "c", "t");

    let err = compare(&engine, &control, &target, &ComparisonConfig::default()).unwrap_err();
    let diff = err.diff_result().unwrap();
    assert_eq!(diff.changed_rows(), 2);
    assert_eq!(cell(&diff.new_rows, 0, "name").as_deref(), Some("c"));
    assert_eq!(cell(&diff.missing_rows, 0, "id").as_deref(), Some("2"));
}

#[test]
fn test_duplicate_rows_are_grouped() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT * FROM (VALUES (1, 'a'), (1, 'a'), (2, 'b')) t(id, name);
         CREATE TABLE t AS SELECT * FROM (VALUES (1, 'a'), (2, 'b')) t(id, name);",
    );
    let (control, target) = load_pair(&engine, "c", "t");

    let result = compare(&engine, &control, &target, &ComparisonConfig::default()).unwrap();
    assert!(result.passed);
    let dup = result.duplicate_diff.unwrap();
    assert_eq!(dup.missing_row_count, 1);
    assert_eq!(dup.new_row_count, 1);
    assert_eq!(cell(&dup.missing_rows, 0, "count").as_deref(), Some("2"));
}

#[test]
fn test_existing_count_column_gets_unique_name() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT * FROM (VALUES (5, 'a'), (5, 'a')) t(\"count\", name);
         CREATE TABLE t AS SELECT * FROM (VALUES (5, 'a')) t(\"count\", name);",
    );
    let (control, target) = load_pair(&engine, "c", "t");

    let result = compare(&engine, &control, &target, &ComparisonConfig::default()).unwrap();
    let dup = result.duplicate_diff.unwrap();
    assert_eq!(dup.count_column, "count_1");
    assert_eq!(cell(&dup.missing_rows, 0, "count").as_deref(), Some("5"));
    assert_eq!(cell(&dup.missing_rows, 0, "count_1").as_deref(), Some("2"));
}

#[test]
fn test_precision_rounds_doubles() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT * FROM (VALUES (1, 0.1::DOUBLE + 0.2::DOUBLE), (2, 5.0::DOUBLE)) t(id, amount);
         CREATE TABLE t AS SELECT * FROM (VALUES (1, 0.3::DOUBLE), (2, 5.00001::DOUBLE)) t(id, amount);",
    );
    let (control, target) = load_pair(&engine, "c", "t");

    assert!(compare(&engine, &control, &target, &ComparisonConfig::default()).is_err());

    let config = ComparisonConfig::default().with_precision(3);
    let result = compare(&engine, &control, &target, &config).unwrap();
    assert!(result.passed);
    assert_eq!(result.rounded_columns, vec!["amount"]);
}

#[test]
fn test_map_columns_compare_natively() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT * FROM (VALUES (1, MAP {'k': 10}), (2, MAP {'k': 20})) t(id, attrs);
         CREATE TABLE t AS SELECT * FROM (VALUES (2, MAP {'k': 20}), (1, MAP {'k': 10})) t(id, attrs);",
    );
    let (control, target) = load_pair(&engine, "c", "t");

    // DuckDB defines equality on MAP, so no text fallback is needed
    let result = compare(&engine, &control, &target, &ComparisonConfig::default()).unwrap();
    assert!(result.passed);
    assert_eq!(result.strategy, SubtractStrategy::Typed);
}

#[test]
fn test_schema_mismatch_on_type() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT 1::INTEGER AS id;
         CREATE TABLE t AS SELECT 1::BIGINT AS id;",
    );
    let (control, target) = load_pair(&engine, "c", "t");

    let err = compare(&engine, &control, &target, &ComparisonConfig::default()).unwrap_err();
    assert!(matches!(err, CompareError::SchemaMismatch { .. }));
}

#[test]
fn test_helper_relations_are_dropped() {
    let engine = engine_with(
        "CREATE TABLE c AS SELECT * FROM (VALUES (1, 'a'), (1, 'a')) t(id, name);
         CREATE TABLE t AS SELECT * FROM (VALUES (1, 'a'), (3, 'z')) t(id, name);
         CREATE TABLE u AS SELECT * FROM (VALUES (1, 'a')) t(id, name);",
    );
    let pairs = TablePair::from_catalog(
        &["c".to_string(), "c".to_string()],
        &["u".to_string(), "t".to_string()],
    )
    .unwrap();

    let outcomes = compare_pairs(&engine, &pairs, &ComparisonConfig::default(), false, None);
    assert!(outcomes[0].passed());
    assert!(!outcomes[1].passed());
    assert_eq!(leftover_relations(&engine), 0);
}

#[test]
fn test_csv_roots() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_csv(
            "control/users.csv",
            &[vec!["id", "name", "score"], vec!["1", "Ann", "1.5"], vec!["2", "Bo", "2.25"]],
        )
        .unwrap();
    fixture
        .create_csv(
            "target/users.csv",
            &[vec!["id", "name", "score"], vec!["2", "Bo", "2.25"], vec!["1", "Ann", "1.5"]],
        )
        .unwrap();

    let engine = DuckDbEngine::open_in_memory(&EngineSettings::default()).unwrap();
    let pairs = TablePair::from_roots(
        &["users".to_string()],
        &fixture.root().join("control"),
        &fixture.root().join("target"),
        TableFormat::Csv,
    );

    let outcomes = compare_pairs(&engine, &pairs, &ComparisonConfig::default(), false, None);
    assert!(outcomes[0].passed(), "{:?}", outcomes[0].error());
}

#[test]
fn test_partitioned_csv_directory() {
    let fixture = TestFixture::new().unwrap();
    let header = vec!["id", "name"];
    fixture
        .create_csv("control/events/part-0.csv", &[header.clone(), vec!["1", "a"]])
        .unwrap();
    fixture
        .create_csv("control/events/part-1.csv", &[header.clone(), vec!["2", "b"]])
        .unwrap();
    fixture
        .create_csv("target/events/part-0.csv", &[header, vec!["1", "a"], vec!["2", "b"]])
        .unwrap();

    let engine = DuckDbEngine::open_in_memory(&EngineSettings::default()).unwrap();
    let control = engine
        .load(&TableSource::path(fixture.root().join("control"), "events", TableFormat::Csv))
        .unwrap();
    let target = engine
        .load(&TableSource::path(fixture.root().join("target"), "events", TableFormat::Csv))
        .unwrap();

    let result = compare(&engine, &control, &target, &ComparisonConfig::default()).unwrap();
    assert_eq!(result.control_count, 2);
    assert!(result.passed);
}

#[test]
fn test_missing_path_table() {
    let fixture = TestFixture::new().unwrap();
    let engine = DuckDbEngine::open_in_memory(&EngineSettings::default()).unwrap();

    let err = engine
        .load(&TableSource::path(fixture.root(), "absent", TableFormat::Parquet))
        .unwrap_err();
    assert!(matches!(err, CompareError::InvalidInput { .. }));
}

#[test]
fn test_engine_settings_applied() {
    let settings = EngineSettings {
        memory_limit: Some("512MB".to_string()),
        threads: Some(2),
    };
    let engine = DuckDbEngine::open_in_memory(&settings).unwrap();
    let threads: i64 = engine
        .connection()
        .query_row("SELECT CAST(current_setting('threads') AS BIGINT)", [], |row| row.get(0))
        .unwrap();
    assert_eq!(threads, 2);
}
