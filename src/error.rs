//! Error types for the verification harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Expected status {expected} for {url}, got {actual}")]
    StatusMismatch {
        url: String,
        expected: u16,
        actual: u16,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Request to {url} failed with status {status}")]
    InterceptStatus { url: String, status: u16 },

    #[error("Request to {url} took {elapsed_ms}ms")]
    InterceptLatency { url: String, elapsed_ms: u64 },

    #[error("Response to {url} is too small ({size} bytes)")]
    InterceptPayload { url: String, size: usize },

    #[error("Timed out waiting for {what} after {budget_ms}ms")]
    Timeout { what: String, budget_ms: u64 },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser script error: {0}")]
    Browser(String),

    #[error("Journey step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Suite parse error: {0}")]
    SuiteParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarnessError {
    /// Whether this failure came from the interception policy rather than a
    /// content assertion.
    pub fn is_intercept_violation(&self) -> bool {
        matches!(
            self,
            HarnessError::InterceptStatus { .. }
                | HarnessError::InterceptLatency { .. }
                | HarnessError::InterceptPayload { .. }
        )
    }

    /// Timeouts are reported distinctly from plain assertion failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::Timeout { .. })
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
