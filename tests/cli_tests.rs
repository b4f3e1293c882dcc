//! Smoke tests for the marketpulse binary.

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::fixtures::{fixture_path, FAST_CONFIG_TOML};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn marketpulse() -> assert_cmd::Command {
    cargo_bin_cmd!("marketpulse")
}

/// Temp dir holding a config with every sleep disabled
fn workspace() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().expect("create temp dir");
    let config = tmp.path().join("marketpulse.toml");
    fs::write(&config, FAST_CONFIG_TOML).unwrap();
    (tmp, config)
}

// ============ init-config ============

#[test]
fn test_init_config_writes_default_file() {
    let tmp = TempDir::new().unwrap();

    marketpulse()
        .current_dir(tmp.path())
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default configuration file"));

    let written = fs::read_to_string(tmp.path().join("config").join("marketpulse.toml")).unwrap();
    assert!(written.contains("[http]"));
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("custom.toml");
    fs::write(&path, "# mine").unwrap();

    marketpulse()
        .arg("init-config")
        .arg("--path")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "# mine");

    marketpulse()
        .arg("init-config")
        .arg("--path")
        .arg(&path)
        .arg("--force")
        .assert()
        .success();
    assert!(fs::read_to_string(&path).unwrap().contains("[http]"));
}

// ============ analyze ============

#[test]
fn test_analyze_text_file_prints_record() {
    let (_tmp, config) = workspace();

    let output = marketpulse()
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .arg(fixture_path("press_release.html"))
        .arg("--text-file")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let record: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(record["pipeline_info"]["phases"]["Phase II"].is_array());
    assert!(record.get("error").is_none());
}

#[test]
fn test_analyze_writes_json_and_csv() {
    let (tmp, config) = workspace();
    let json_path = tmp.path().join("record.json");
    let csv_path = tmp.path().join("competitors.csv");

    marketpulse()
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .arg(fixture_path("press_release.html"))
        .arg("--text-file")
        .arg("-o")
        .arg(&json_path)
        .arg("--csv")
        .arg(&csv_path)
        .assert()
        .success();

    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert!(record["competitors"].is_array());

    let csv = fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with("canonical_name,deal_type,confidence,context"));
    assert!(csv.contains("Company X"));
}

#[test]
fn test_analyze_invalid_input_prints_error_record() {
    let (_tmp, config) = workspace();

    marketpulse()
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .arg("example.com/news")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error\""))
        .stdout(predicate::str::contains("Invalid input"));
}

#[test]
fn test_missing_explicit_config_fails() {
    marketpulse()
        .arg("--config")
        .arg("/nonexistent/marketpulse.toml")
        .arg("analyze")
        .arg("Acme Bio")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

// ============ batch ============

#[test]
fn test_batch_writes_summary() {
    let (tmp, config) = workspace();
    let out_dir = tmp.path().join("results");

    marketpulse()
        .arg("--config")
        .arg(&config)
        .arg("batch")
        .arg(fixture_path("inputs.csv"))
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("-j")
        .arg("2")
        .assert()
        .failure()
        .stdout(predicate::str::contains("BATCH ANALYSIS COMPLETE"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("batch_summary.json")).unwrap()).unwrap();
    assert_eq!(summary["total_inputs"], 2);
    assert_eq!(summary["failed"], 2);
    assert_eq!(summary["input_results"][0]["label"], "broken url");
}

#[test]
fn test_batch_rejects_zero_concurrency() {
    marketpulse()
        .arg("batch")
        .arg(fixture_path("inputs.csv"))
        .arg("-j")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Concurrency must be greater than 0"));
}
