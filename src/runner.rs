//! Scenario Runner: sequences verification, interception, benchmarking, and
//! result recording across suites and journeys
//!
//! A failing descriptor never halts its suite: every endpoint is verified,
//! every outcome becomes a result row, and the artifacts are finalized
//! regardless of the pass/fail mix.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::bench::BenchRecorder;
use crate::endpoint::Suite;
use crate::error::{HarnessError, HarnessResult};
use crate::journey::Journey;
use crate::report::{ResultSink, RunLog, TestRecord};
use crate::verify::{Verifier, VerifierConfig};

/// Configuration for a full run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub verifier: VerifierConfig,

    /// Directory holding the declarative suite YAML files.
    pub suites_dir: PathBuf,

    /// Directory receiving results.tsv, benchmark artifacts, and the log.
    pub artifacts_dir: PathBuf,

    /// Timeout for each benchmarked request.
    pub benchmark_timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            verifier: VerifierConfig::default(),
            suites_dir: PathBuf::from("suites"),
            artifacts_dir: PathBuf::from("test-results"),
            benchmark_timeout_ms: 60_000,
        }
    }
}

/// Aggregate outcome of one suite.
#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub records: Vec<TestRecord>,
}

/// Aggregate outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl RunSummary {
    fn absorb(&mut self, result: &SuiteResult) {
        self.total += result.total;
        self.passed += result.passed;
        self.failed += result.failed;
    }
}

/// Composes the verifier, interceptor, benchmark recorder, and result sink
/// into a run.
pub struct ScenarioRunner {
    verifier: Verifier,
    sink: ResultSink,
    log: RunLog,
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig, verifier: Verifier) -> Self {
        let sink = ResultSink::new(config.artifacts_dir.join("results.tsv"));
        let log = RunLog::new(config.artifacts_dir.join("test.log"));
        Self {
            verifier,
            sink,
            log,
            config,
        }
    }

    /// Truncate the results artifact. Called exactly once per run, before
    /// any suite executes.
    pub fn init_run(&self) -> HarnessResult<()> {
        self.sink.init_run()
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Discover every suite in the suites directory, in file-name order.
    pub fn load_suites(&self) -> HarnessResult<Vec<Suite>> {
        Suite::load_all(&self.config.suites_dir)
    }

    /// Verify every descriptor in a suite, continuing past failures, and
    /// append one result row per descriptor.
    pub async fn run_suite(&self, suite: &Suite) -> HarnessResult<SuiteResult> {
        let start = Instant::now();
        let mut records = Vec::with_capacity(suite.endpoints.len());
        let mut passed = 0;
        let mut failed = 0;

        info!("Running suite \"{}\" ({} endpoint(s))", suite.name, suite.endpoints.len());

        for endpoint in &suite.endpoints {
            let title = vec![suite.name.clone(), format!("Tests for {}", endpoint.url)];
            match self.verifier.verify(endpoint).await {
                Ok(outcome) => {
                    passed += 1;
                    info!("✓ {} ({} interception(s))", endpoint.url, outcome.interceptions);
                    self.log.log(&format!(
                        "passed: {} status={} interceptions={}",
                        endpoint.url, outcome.status, outcome.interceptions
                    ))?;
                    records.push(TestRecord::passed(title));
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", endpoint.url, e);
                    self.log.log(&format!("failed: {} - {e}", endpoint.url))?;
                    records.push(TestRecord::failed(title, e.to_string()));
                }
            }
        }

        self.sink.record_spec(&records)?;

        Ok(SuiteResult {
            name: suite.name.clone(),
            total: suite.endpoints.len(),
            passed,
            failed,
            duration_ms: start.elapsed().as_millis() as u64,
            records,
        })
    }

    /// Benchmark every descriptor in a suite: mark, request, mark, measure.
    /// Measurements merge into the suite's benchmark artifact at the end,
    /// whether or not individual requests failed.
    pub async fn benchmark_suite(&self, suite: &Suite) -> HarnessResult<()> {
        let artifact = suite
            .benchmark_artifact
            .clone()
            .unwrap_or_else(|| "benchmark_view.json".to_string());
        let path = self.config.artifacts_dir.join(artifact);
        let timeout = Duration::from_millis(self.config.benchmark_timeout_ms);

        let mut recorder = BenchRecorder::new();
        for endpoint in &suite.endpoints {
            let start_mark = format!("start_{}", endpoint.url);
            let end_mark = format!("end_{}", endpoint.url);

            recorder.mark(start_mark.clone());
            let request = self.verifier.time_request(endpoint, timeout).await;
            recorder.mark(end_mark.clone());

            match request {
                Ok(()) => {
                    let duration = recorder.measure(
                        format!("Data load time - {}", endpoint.url),
                        &start_mark,
                        &end_mark,
                    )?;
                    info!("Benchmarked {} in {duration}ms", endpoint.url);
                }
                Err(e) => {
                    error!("Benchmark request for {} failed: {e}", endpoint.url);
                    self.log
                        .log(&format!("benchmark failed: {} - {e}", endpoint.url))?;
                }
            }
            recorder.clear_marks();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        recorder.flush(&format!("Benchmark Test for {}", suite.name), &path)
    }

    /// Execute a journey end to end and record its outcome as one test.
    pub async fn run_journey(&self, journey: &Journey) -> HarnessResult<SuiteResult> {
        let start = Instant::now();
        let bridge = self.verifier.bridge().ok_or_else(|| {
            HarnessError::Browser("journeys require a browser bridge".to_string())
        })?;

        let title = vec!["user_journey".to_string(), journey.name.clone()];
        info!("Running journey \"{}\" ({} step(s))", journey.name, journey.steps.len());

        let record = match bridge.run_journey(journey).await {
            Ok(report) if report.success => {
                for step in &report.steps {
                    self.log
                        .log(&format!("journey {}: {} ({}ms)", journey.name, step.label, step.duration_ms))?;
                }
                info!("✓ {} ({} step(s))", journey.name, report.steps.len());
                TestRecord::passed(title)
            }
            Ok(report) => {
                let failing = report
                    .steps
                    .iter()
                    .find(|step| !step.success);
                let reason = failing
                    .map(|step| {
                        format!(
                            "{}: {}",
                            step.label,
                            step.error.as_deref().unwrap_or("unknown error")
                        )
                    })
                    .unwrap_or_else(|| "journey failed with no step report".to_string());
                error!("✗ {} - {reason}", journey.name);
                self.log
                    .log(&format!("journey failed: {} - {reason}", journey.name))?;
                TestRecord::failed(title, reason)
            }
            Err(e) => {
                error!("✗ {} - {e}", journey.name);
                self.log.log(&format!("journey failed: {} - {e}", journey.name))?;
                TestRecord::failed(title, e.to_string())
            }
        };

        let failed = usize::from(record.status == crate::report::TestStatus::Failed);
        let records = vec![record];
        self.sink.record_spec(&records)?;

        Ok(SuiteResult {
            name: journey.name.clone(),
            total: 1,
            passed: 1 - failed,
            failed,
            duration_ms: start.elapsed().as_millis() as u64,
            records,
        })
    }

    /// Run every discovered suite (verification then benchmark pass) and
    /// the given journeys. Artifacts are finalized even when tests fail.
    pub async fn run_all(&self, journeys: &[Journey]) -> HarnessResult<RunSummary> {
        let start = Instant::now();
        self.init_run()?;

        let mut summary = RunSummary::default();
        let suites = self.load_suites()?;

        for suite in &suites {
            let result = self.run_suite(suite).await?;
            summary.absorb(&result);
            self.benchmark_suite(suite).await?;
        }

        for journey in journeys {
            let result = self.run_journey(journey).await?;
            summary.absorb(&result);
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Run complete: {} passed, {} failed ({} ms)",
            summary.passed, summary.failed, summary.duration_ms
        );
        Ok(summary)
    }
}
