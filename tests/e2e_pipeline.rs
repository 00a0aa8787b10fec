// logtally - tests/e2e_pipeline.rs
//
// End-to-end tests for the full analysis pipeline.
//
// These tests exercise the real filesystem, real line parsing, the rayon
// processing stage and real chrono timestamp handling. Fixtures are read
// from tests/fixtures/; every output goes to a temporary directory.

use logtally::app::pipeline::{Analyzer, PipelineState};
use logtally::platform::config::{load_config, PipelineContext};
use logtally::util::constants;
use logtally::util::error::{SinkError, Stage, StageFailure};
use std::fs;
use std::path::{Path, PathBuf};

// =============================================================================
// Helpers
// =============================================================================

/// Absolute path to an on-disk fixture file.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn context(input: &str, level: &str, output: &Path) -> PipelineContext {
    PipelineContext::new(fixture(input))
        .with(constants::KEY_LOG_LEVEL, level)
        .with(constants::KEY_OUTPUT_PATH, output.to_string_lossy())
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

// =============================================================================
// Report scenarios
// =============================================================================

/// The three-line scenario with an Info threshold.
#[test]
fn e2e_scenario_report_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");

    let mut analyzer = Analyzer::new();
    let report = analyzer
        .analyze(&context("scenario.log", "Info", &output))
        .unwrap();

    let text = read(&output);
    assert_eq!(text, report.body());
    assert!(text.starts_with("Log Analysis Report as of "), "{text}");
    assert!(
        text.contains("Time Range: from 2024-01-01 10:00:00 to 2024-01-01 10:10:00\n"),
        "{text}"
    );
    assert!(text.contains("Total Errors: 2\n"), "{text}");
    assert!(text.contains("Total Warnings: 0\n"), "{text}");
    assert!(text.ends_with("- Error: 2\n- Info: 1\n"), "{text}");

    assert_eq!(analyzer.state(), PipelineState::Done);
    assert_eq!(analyzer.finalize_count(), 1);
}

/// An existing report is replaced, not appended to.
#[test]
fn e2e_report_overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");
    fs::write(&output, "stale report\n".repeat(100)).unwrap();

    Analyzer::new()
        .analyze(&context("scenario.log", "Error", &output))
        .unwrap();

    let text = read(&output);
    assert!(!text.contains("stale report"));
    assert!(text.contains("Total Errors: 2\n"));
    assert!(!text.contains("- Info"));
}

/// Positional access lines, with noise and a blank line mixed in.
#[test]
fn e2e_access_log_auto_detected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");

    let mut analyzer = Analyzer::new();
    let report = analyzer
        .analyze(&context("access_sample.log", "Info", &output))
        .unwrap();

    let stats = analyzer.last_parse_stats();
    assert_eq!(stats.lines, 8);
    assert_eq!(stats.parsed, 6);
    assert_eq!(stats.discarded, 2);

    // Debug is below the threshold.
    assert_eq!(report.total(), 5);
    let text = read(&output);
    assert!(text.contains("Total Errors: 2\n"), "{text}");
    assert!(text.contains("Total Warnings: 1\n"), "{text}");
    assert!(
        text.contains("Time Range: from 2024-03-05 08:00:01 to 2024-03-05 08:00:06\n"),
        "{text}"
    );
}

/// Criteria over access-line fields.
#[test]
fn e2e_access_log_filtered_by_status_and_ip() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");
    let ctx = context("access_sample.log", "Debug", &output)
        .with(constants::KEY_FILTER, "IPAddress=10.0.0.5 AND StatusCode=500");

    let report = Analyzer::new().analyze(&ctx).unwrap();
    assert_eq!(report.total(), 1);
    assert_eq!(report.levels().get("Error"), 1);
}

// =============================================================================
// Combined log format and export
// =============================================================================

#[test]
fn e2e_combined_log_exported_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");
    let export = dir.path().join("records.json");
    let ctx = context("combined_sample.log", "Debug", &output)
        .with(constants::KEY_PARSE_MODE, "combined")
        .with(constants::KEY_EXPORT_PATH, export.to_string_lossy());

    let mut analyzer = Analyzer::new();
    let report = analyzer.analyze(&ctx).unwrap();
    assert_eq!(report.total(), 4);
    assert_eq!(analyzer.last_parse_stats().discarded, 1);

    // Offsets are normalised to UTC.
    let text = read(&output);
    assert!(
        text.contains("Time Range: from 2000-10-10 20:55:36 to 2000-10-10 21:01:00\n"),
        "{text}"
    );

    let exported: Vec<serde_json::Value> = serde_json::from_str(&read(&export)).unwrap();
    assert_eq!(exported.len(), 4);
    assert_eq!(exported[0]["user"], "frank");
    assert_eq!(exported[0]["size"], 2326);
    assert_eq!(exported[1]["size"], serde_json::Value::Null);
    assert_eq!(exported[2]["statusCode"], 500);
}

#[test]
fn e2e_multi_word_request_criterion_and_csv_export() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");
    let export = dir.path().join("records.csv");
    let ctx = context("combined_sample.log", "Info", &output)
        .with(constants::KEY_FILTER, "Request=GET /reports HTTP/1.1 AND Level=Error")
        .with(constants::KEY_EXPORT_PATH, export.to_string_lossy());

    let report = Analyzer::new().analyze(&ctx).unwrap();
    assert_eq!(report.total(), 2);

    let csv = read(&export);
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 3, "{csv}");
    assert!(rows[0].starts_with("id,timestamp,level,message"));
    assert!(rows[1..].iter().all(|r| r.contains("GET /reports HTTP/1.1")));
}

#[test]
fn e2e_or_connective_legacy_versus_or_of_ands() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");
    let base = context("combined_sample.log", "Debug", &output)
        .with(constants::KEY_FILTER, "Level=Error OR Level=Warning");

    // Legacy: both criteria must hold, which no record satisfies.
    let legacy = Analyzer::new().analyze(&base).unwrap();
    assert_eq!(legacy.total(), 0);
    assert!(read(&output).contains("Time Range: No logs available\n"));

    let or_of_ands = Analyzer::new()
        .analyze(&base.clone().with(constants::KEY_CONNECTIVES, "or-of-ands"))
        .unwrap();
    assert_eq!(or_of_ands.total(), 3);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn e2e_unwritable_output_fails_in_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("no-such-dir").join("report.txt");

    let mut analyzer = Analyzer::new();
    let err = analyzer
        .analyze(&context("scenario.log", "Info", &output))
        .unwrap_err();

    assert_eq!(err.stage, Stage::Persisting);
    match &err.cause {
        StageFailure::Sink(SinkError::Io { path, .. }) => assert_eq!(path, &output),
        other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(analyzer.state(), PipelineState::Failed(Stage::Persisting));
    assert_eq!(analyzer.finalize_count(), 1);
}

#[test]
fn e2e_missing_input_fails_in_reading() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");
    let err = Analyzer::new()
        .analyze(&context("does_not_exist.log", "Info", &output))
        .unwrap_err();

    assert_eq!(err.stage, Stage::Reading);
    assert!(err.to_string().contains("does_not_exist.log"), "{err}");
    assert!(!output.exists());
}

// =============================================================================
// config.toml
// =============================================================================

/// Values set on the context win over config.toml; the rest fill in.
#[test]
fn e2e_config_file_fills_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.txt");
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[analysis]\nlog_level = \"Debug\"\noutput_path = {:?}\nfilter = \"StatusCode=500\"\n",
            output.to_string_lossy()
        ),
    )
    .unwrap();

    let (config, warnings) = load_config(&config_path);
    assert!(warnings.is_empty(), "{warnings:?}");

    let mut ctx = PipelineContext::new(fixture("access_sample.log"))
        .with(constants::KEY_LOG_LEVEL, "Error");
    ctx.merge_missing(&config.analysis);

    let report = Analyzer::new().analyze(&ctx).unwrap();
    assert_eq!(report.total(), 1);
    assert!(output.exists());
}
