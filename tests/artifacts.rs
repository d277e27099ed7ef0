//! Artifact lifecycle tests across components
//!
//! These cover what survives a whole run: the shipped suite files parse,
//! result rows written by one component read back cleanly in another, and
//! benchmark artifacts accumulate across independent recorders the way they
//! do across separate suite passes.

use portal_e2e::bench::BenchRecorder;
use portal_e2e::endpoint::Suite;
use portal_e2e::report::{ResultSink, RunLog, TestRecord};

#[test]
fn shipped_suites_load_and_validate() {
    let suites = Suite::load_all(std::path::Path::new("suites")).expect("suites dir loads");
    assert_eq!(suites.len(), 2);

    let names: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["services", "views"]);

    let services = &suites[0];
    assert_eq!(services.benchmark_artifact.as_deref(), Some("benchmark_api.json"));
    assert!(services.endpoints.iter().any(|e| e.is_download));

    let views = &suites[1];
    assert!(views
        .endpoints
        .iter()
        .any(|e| e.table_id.as_deref() == Some("ancillaryTable")));
}

#[test]
fn failed_row_error_survives_a_tsv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ResultSink::new(dir.path().join("results.tsv"));
    sink.init_run().unwrap();

    let message = "expected more than 2 rows in #resultsTable on /bin/BOLD:AAA2953, found 0\n\twith a tab and newline";
    sink.record_spec(&[TestRecord::failed(
        vec!["views".to_string(), "Tests for /bin/BOLD:AAA2953".to_string()],
        message,
    )])
    .unwrap();

    // The error field is JSON-stringified, so embedded tabs and newlines
    // never break the row structure.
    let content = std::fs::read_to_string(dir.path().join("results.tsv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    let fields: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0], "failed");
    assert_eq!(fields[1], "views > Tests for /bin/BOLD:AAA2953");
    let recovered: String = serde_json::from_str(fields[2]).unwrap();
    assert_eq!(recovered, message);
}

#[test]
fn benchmark_artifact_accumulates_across_recorders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("benchmark_view.json");

    // Each suite pass uses its own recorder, as the runner does.
    let mut first = BenchRecorder::new();
    first.mark("start_/bin");
    first.mark("end_/bin");
    first.measure("Data load time - /bin", "start_/bin", "end_/bin").unwrap();
    first.flush("Benchmark Test for views", &path).unwrap();

    let mut second = BenchRecorder::new();
    second.mark("start_/api/counts");
    second.mark("end_/api/counts");
    second
        .measure("Data load time - /api/counts", "start_/api/counts", "end_/api/counts")
        .unwrap();
    second.flush("Benchmark Test for services", &path).unwrap();

    let artifact: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(artifact.len(), 2);
    assert_eq!(
        artifact["Benchmark Test for views"][0]["name"],
        "Data load time - /bin"
    );
    assert_eq!(
        artifact["Benchmark Test for services"][0]["name"],
        "Data load time - /api/counts"
    );
}

#[test]
fn run_log_creates_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("deep").join("test-results").join("test.log");

    let log = RunLog::new(&nested);
    log.log("passed: /about status=200 interceptions=3").unwrap();
    log.log("failed: /bin - expected more than 10 rows").unwrap();

    let content = std::fs::read_to_string(&nested).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.lines().all(|l| l.contains(" - ")));
}
