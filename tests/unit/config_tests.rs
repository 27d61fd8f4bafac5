//! Unit tests for configuration loading and command-line overrides

use crate::common::TestFixture;
use clap::Parser;
use pipecompare::cli::Cli;
use pipecompare::{CompareError, ComparisonConfig};
use std::fs;

#[test]
fn test_config_file_values_used() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.root().join("compare.json");
    fs::write(&path, r#"{"precision": 2, "row_diff_tolerance": 0.25, "preview_rows": 5}"#).unwrap();

    let cli = Cli::try_parse_from(&[
        "pipecompare",
        "--control-tables", "a",
        "--target-tables", "b",
        "--config", path.to_str().unwrap(),
    ])
    .unwrap();
    let config = cli.comparison_config().unwrap();

    assert_eq!(
        config,
        ComparisonConfig::default()
            .with_precision(2)
            .with_row_diff_tolerance(0.25)
            .with_preview_rows(5)
    );
}

#[test]
fn test_flags_override_config_file() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.root().join("compare.json");
    fs::write(&path, r#"{"precision": 2, "row_diff_tolerance": 0.25}"#).unwrap();

    let cli = Cli::try_parse_from(&[
        "pipecompare",
        "--control-tables", "a",
        "--target-tables", "b",
        "--config", path.to_str().unwrap(),
        "--compare-precision", "4",
        "--row-diff-tolerance", "0",
    ])
    .unwrap();
    let config = cli.comparison_config().unwrap();

    assert_eq!(config.precision, Some(4));
    assert_eq!(config.row_diff_tolerance, 0.0);
    assert_eq!(config.preview_rows, pipecompare::DEFAULT_PREVIEW_ROWS);
}

#[test]
fn test_missing_config_file() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.root().join("absent.json");

    let cli = Cli::try_parse_from(&[
        "pipecompare",
        "--control-tables", "a",
        "--target-tables", "b",
        "--config", path.to_str().unwrap(),
    ])
    .unwrap();

    assert!(matches!(cli.comparison_config(), Err(CompareError::Config { .. })));
}

#[test]
fn test_malformed_config_file() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.root().join("broken.json");
    fs::write(&path, "{ precision: ").unwrap();

    let err = ComparisonConfig::from_json_file(&path).unwrap_err();
    assert!(matches!(err, CompareError::Json(_)));
}

#[test]
fn test_config_serializes_with_field_names() {
    let config = ComparisonConfig::default().with_precision(3);
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["precision"], 3);
    assert_eq!(json["row_diff_tolerance"], 0.0);
}

#[test]
fn test_config_file_precision_out_of_range() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.root().join("compare.json");
    fs::write(&path, r#"{"precision": 3000000000}"#).unwrap();

    let err = ComparisonConfig::from_json_file(&path).unwrap_err();
    assert!(matches!(err, CompareError::Config { .. }));
    assert!(err.to_string().contains("at most 38"));
}

#[test]
fn test_largest_precision_accepted() {
    let config = ComparisonConfig::default().with_precision(pipecompare::config::MAX_PRECISION);
    assert!(config.validate().is_ok());
}
