//! Network interception records and the validation policy applied to them
//!
//! While a page renders, every outgoing API call is captured by the browser
//! bridge as a [`RawCapture`]. The report derives chained latencies and
//! payload sizes, then checks each record against the policy: status below
//! 400, chained latency below the budget, and a minimum serialized payload
//! size unless the URL serves binary content (maps, sequence, qr-code).
//!
//! Latency is deliberately chained: record N is measured from record N-1's
//! completion (the first from arming time), not per-request duration.

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// One observed API call as reported by the browser bridge. Timestamps are
/// milliseconds since the interceptor was armed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCapture {
    pub url: String,
    pub method: String,
    pub status: u16,
    /// Serialized response body; empty for binary responses.
    #[serde(default)]
    pub body: String,
    pub started_ms: u64,
    pub completed_ms: u64,
}

/// A validated, read-only interception record scoped to one page visit.
#[derive(Debug, Clone)]
pub struct Interception {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub body: String,
    pub started_ms: u64,
    pub completed_ms: u64,
    /// Chained latency: completion minus the previous record's completion.
    pub elapsed_ms: u64,
    pub payload_size: usize,
}

/// Thresholds applied to every intercepted call.
#[derive(Debug, Clone)]
pub struct InterceptPolicy {
    /// Chained latency budget per call.
    pub max_latency_ms: u64,

    /// Serialized response body must exceed this many bytes.
    pub min_payload_bytes: usize,

    /// URL fragments exempt from the payload-size check only; status and
    /// latency checks still apply.
    pub exempt: Vec<String>,
}

impl Default for InterceptPolicy {
    fn default() -> Self {
        Self {
            max_latency_ms: 1000,
            min_payload_bytes: 10,
            exempt: vec![
                "/api/maps/".to_string(),
                "/api/sequence/".to_string(),
                "/api/qr-code/".to_string(),
            ],
        }
    }
}

impl InterceptPolicy {
    fn is_exempt(&self, url: &str) -> bool {
        self.exempt.iter().any(|fragment| url.contains(fragment))
    }
}

/// All interceptions observed during one page visit, ordered by completion.
#[derive(Debug, Clone, Default)]
pub struct InterceptReport {
    pub records: Vec<Interception>,
}

impl InterceptReport {
    /// Build chained records from raw captures. Records are ordered by the
    /// time the response completed, not the time the request was issued.
    pub fn from_raw(mut raw: Vec<RawCapture>) -> Self {
        raw.sort_by_key(|r| r.completed_ms);

        let mut records = Vec::with_capacity(raw.len());
        let mut previous_completion = 0u64;
        for capture in raw {
            let elapsed_ms = capture.completed_ms.saturating_sub(previous_completion);
            previous_completion = capture.completed_ms;
            records.push(Interception {
                elapsed_ms,
                payload_size: capture.body.len(),
                url: capture.url,
                method: capture.method,
                status: capture.status,
                body: capture.body,
                started_ms: capture.started_ms,
                completed_ms: capture.completed_ms,
            });
        }
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check every record against the policy, returning the first violation.
    /// An empty report passes: a page that triggered no API calls is a no-op,
    /// not a failure.
    pub fn check_all(&self, policy: &InterceptPolicy) -> HarnessResult<()> {
        for record in &self.records {
            if record.status >= 400 {
                return Err(HarnessError::InterceptStatus {
                    url: record.url.clone(),
                    status: record.status,
                });
            }
            if record.elapsed_ms >= policy.max_latency_ms {
                return Err(HarnessError::InterceptLatency {
                    url: record.url.clone(),
                    elapsed_ms: record.elapsed_ms,
                });
            }
            if !policy.is_exempt(&record.url) && record.payload_size <= policy.min_payload_bytes {
                return Err(HarnessError::InterceptPayload {
                    url: record.url.clone(),
                    size: record.payload_size,
                });
            }
        }
        Ok(())
    }
}
