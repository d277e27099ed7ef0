//! Run-level artifacts: the TSV result sink and the plain-text run log
//!
//! The sink is initialized once per run (header only) and appended after
//! each suite completes: one tab-separated row per test with the status,
//! the title path joined by " > ", and the JSON-stringified error for
//! failures. Every write is flushed to disk before the next test begins.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarnessResult;

const HEADER: &str = "Status\tTestName\tDisplay Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Pending,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Pending => "pending",
        }
    }
}

/// One executed test case, appended to the sink at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub status: TestStatus,
    /// Ordered nested description strings, e.g. ["views", "Tests for /bin"].
    pub title_path: Vec<String>,
    /// Present iff failed.
    pub display_error: Option<String>,
}

impl TestRecord {
    pub fn passed(title_path: Vec<String>) -> Self {
        Self {
            status: TestStatus::Passed,
            title_path,
            display_error: None,
        }
    }

    pub fn failed(title_path: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Failed,
            title_path,
            display_error: Some(error.into()),
        }
    }

    fn as_row(&self) -> String {
        let error = match (&self.status, &self.display_error) {
            (TestStatus::Failed, Some(error)) => {
                serde_json::to_string(error).unwrap_or_default()
            }
            _ => String::new(),
        };
        format!(
            "{}\t{}\t{}",
            self.status.as_str(),
            self.title_path.join(" > "),
            error
        )
    }
}

/// Append-only TSV results artifact, truncated once per run.
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the target directory exists and truncate the artifact down to
    /// its header. Prior content from earlier runs is cleared.
    pub fn init_run(&self) -> HarnessResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, HEADER)?;
        Ok(())
    }

    /// Append one row per record after a suite completes. If the artifact is
    /// absent or blank the header is written first; otherwise rows are
    /// appended with a leading newline.
    pub fn record_spec(&self, records: &[TestRecord]) -> HarnessResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let rows: Vec<String> = records.iter().map(TestRecord::as_row).collect();
        let existing = std::fs::read_to_string(&self.path).unwrap_or_default();

        if existing.trim().is_empty() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, format!("{HEADER}\n{}", rows.join("\n")))?;
        } else {
            let mut file = OpenOptions::new().append(true).open(&self.path)?;
            file.write_all(format!("\n{}", rows.join("\n")).as_bytes())?;
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Plain-text run log: one `<ISO-8601> - <message>` line per call.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn log(&self, message: &str) -> HarnessResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        file.write_all(format!("{timestamp} - {message}\n").as_bytes())?;
        Ok(())
    }
}
