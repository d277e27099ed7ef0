//! Benchmark marks, measures, and the merged JSON artifact
//!
//! `mark` places a named timestamp, `measure` records the interval between
//! two marks. At suite completion the measurements merge into a persistent
//! JSON artifact keyed by suite name: entries for other suites are always
//! preserved, the current suite's entries are replaced for this run.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HarnessError, HarnessResult};

/// One timed interval, as persisted in the benchmark artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub timestamp: String,
}

/// Records named marks and derived interval measurements for one run.
#[derive(Debug, Default)]
pub struct BenchRecorder {
    marks: HashMap<String, Instant>,
    measurements: Vec<Measurement>,
}

impl BenchRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a named timestamp. Re-marking a label moves it.
    pub fn mark(&mut self, label: impl Into<String>) {
        self.marks.insert(label.into(), Instant::now());
    }

    /// Record the interval between two previously placed marks.
    pub fn measure(
        &mut self,
        name: impl Into<String>,
        start_label: &str,
        end_label: &str,
    ) -> HarnessResult<u64> {
        let start = *self.marks.get(start_label).ok_or_else(|| {
            HarnessError::Assertion(format!("unknown benchmark mark \"{start_label}\""))
        })?;
        let end = *self.marks.get(end_label).ok_or_else(|| {
            HarnessError::Assertion(format!("unknown benchmark mark \"{end_label}\""))
        })?;

        let duration_ms = end.saturating_duration_since(start).as_millis() as u64;
        self.measurements.push(Measurement {
            name: name.into(),
            duration_ms,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        Ok(duration_ms)
    }

    /// Marks are valid for the duration of one test.
    pub fn clear_marks(&mut self) {
        self.marks.clear();
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Merge this run's measurements into the artifact under `suite`, then
    /// clear them. Other suites' entries are preserved; the same suite's
    /// entries are replaced, so repeated flushes never accumulate duplicates.
    pub fn flush(&mut self, suite: &str, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut artifact: serde_json::Map<String, serde_json::Value> = match std::fs::read_to_string(path)
        {
            Ok(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
            _ => serde_json::Map::new(),
        };

        artifact.insert(
            suite.to_string(),
            serde_json::to_value(&self.measurements)?,
        );
        std::fs::write(path, serde_json::to_string_pretty(&artifact)?)?;

        info!(
            "Benchmark artifact updated: {} ({} measurement(s) for \"{suite}\")",
            path.display(),
            self.measurements.len()
        );
        self.measurements.clear();
        Ok(())
    }
}
