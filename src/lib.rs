//! Portal E2E Verification Harness
//!
//! This crate provides a Rust-controlled verification suite for the
//! biodiversity data portal that:
//! - Describes endpoints and pages under test as declarative YAML descriptors
//! - Intercepts every API call triggered while a page renders and validates
//!   status, latency, and payload-size policies
//! - Issues raw HTTP checks against the same endpoints (status, JSON shape,
//!   rendered markup, file downloads)
//! - Persists pass/fail results (TSV) and load-time benchmarks (merged JSON)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── run_suite(suite) -> SuiteResult                      │
//! │    ├── benchmark_suite(suite) -> merged JSON artifact       │
//! │    └── run_journey(journey) -> TestRecord                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Verifier                                                   │
//! │    ├── render page with interception armed (Playwright)     │
//! │    ├── drain in-flight API calls, check policy              │
//! │    ├── raw request via reqwest, assert status/body shape    │
//! │    └── trigger downloads, assert on-disk size/content       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Endpoint (YAML)                                            │
//! │    url, method, body, qs, headers, expected_status,         │
//! │    fail_on_status_code, is_download, table_id/table_min_len,│
//! │    expected_keys, expected_key_values, result_array_min_len │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bench;
pub mod browser;
pub mod endpoint;
pub mod error;
pub mod html;
pub mod intercept;
pub mod journey;
pub mod report;
pub mod runner;
pub mod verify;

pub use endpoint::{Endpoint, Suite};
pub use error::{HarnessError, HarnessResult};
pub use journey::{Journey, JourneyStep};
pub use runner::ScenarioRunner;
pub use verify::Verifier;
