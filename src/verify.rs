//! Endpoint verification: raw requests, response assertions, downloads
//!
//! The verifier drives one descriptor end to end: render the page with
//! interception armed (when a browser bridge is attached), drain and check
//! the intercepted calls, issue the raw request, assert status and body
//! shape, and fetch download endpoints into the downloads directory.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::browser::BrowserBridge;
use crate::endpoint::Endpoint;
use crate::error::{HarnessError, HarnessResult};
use crate::html;
use crate::intercept::{InterceptPolicy, InterceptReport};

/// Configuration for the endpoint verifier.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Base URL of the portal under test.
    pub base_url: String,

    /// Directory where download endpoints save their files.
    pub downloads_dir: PathBuf,

    /// Default per-request timeout for raw checks.
    pub request_timeout_ms: u64,

    /// Bounded wait for a download to complete.
    pub download_timeout_ms: u64,

    /// Policy applied to intercepted API calls during page renders.
    pub policy: InterceptPolicy,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            downloads_dir: PathBuf::from("test-results/downloads"),
            request_timeout_ms: 30_000,
            download_timeout_ms: 15_000,
            policy: InterceptPolicy::default(),
        }
    }
}

/// What one verification observed.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub url: String,
    pub status: u16,
    /// Number of API calls intercepted during the page render.
    pub interceptions: usize,
    pub table_rows: Option<usize>,
    pub downloaded: Option<PathBuf>,
}

/// Verifies endpoint descriptors against the live portal.
pub struct Verifier {
    client: reqwest::Client,
    bridge: Option<BrowserBridge>,
    config: VerifierConfig,
}

impl Verifier {
    /// Verifier without a browser: raw checks, structured-body and markup
    /// assertions, and downloads. Page rendering and table assertions are
    /// skipped.
    pub fn new(config: VerifierConfig) -> HarnessResult<Self> {
        let client = reqwest::Client::builder().build()?;
        std::fs::create_dir_all(&config.downloads_dir)?;
        Ok(Self {
            client,
            bridge: None,
            config,
        })
    }

    /// Verifier with in-browser rendering and interception enabled.
    pub fn with_bridge(config: VerifierConfig, bridge: BrowserBridge) -> HarnessResult<Self> {
        let mut verifier = Self::new(config)?;
        verifier.bridge = Some(bridge);
        Ok(verifier)
    }

    pub fn bridge(&self) -> Option<&BrowserBridge> {
        self.bridge.as_ref()
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify one descriptor. Any assertion failure raises immediately with
    /// the failing expectation and the observed value.
    pub async fn verify(&self, endpoint: &Endpoint) -> HarnessResult<Outcome> {
        endpoint.validate()?;
        debug!("Verifying {} {}", endpoint.method, endpoint.url);

        let mut interceptions = 0;
        let mut table_rows = None;

        // Page descriptors render in-browser first, with interception armed
        // on the API prefix. Download descriptors skip rendering and every
        // DOM assertion.
        if !endpoint.is_download && endpoint.expected_status == 200 {
            if let Some(bridge) = &self.bridge {
                let page = bridge.render_page(endpoint).await?;

                if endpoint.fail_on_status_code {
                    if let Some(status) = page.visit_status {
                        if status >= 400 {
                            return Err(HarnessError::Transport {
                                url: endpoint.url.clone(),
                                reason: format!("page visit returned status {status}"),
                            });
                        }
                    }
                }
                if !page.settled {
                    return Err(HarnessError::Timeout {
                        what: format!("network idle on {}", endpoint.url),
                        budget_ms: bridge.config().settle_timeout_ms,
                    });
                }

                let report = InterceptReport::from_raw(page.captures);
                interceptions = report.len();
                report.check_all(&self.config.policy)?;

                if endpoint.table_id.is_some() {
                    let rows = page.table_rows.unwrap_or(0);
                    check_table(endpoint, rows)?;
                    table_rows = Some(rows);
                }
            }
        }

        // Raw request, independent of rendering.
        let timeout = Duration::from_millis(
            endpoint
                .request_timeout_ms
                .unwrap_or(self.config.request_timeout_ms),
        );
        let response = self
            .issue(endpoint, timeout)
            .await
            .map_err(|err| request_error(endpoint, timeout, err))?;

        let status = response.status().as_u16();
        if endpoint.fail_on_status_code && !response.status().is_success() {
            return Err(HarnessError::Transport {
                url: endpoint.url.clone(),
                reason: format!("unexpected status {status}"),
            });
        }
        if status != endpoint.expected_status {
            return Err(HarnessError::StatusMismatch {
                url: endpoint.url.clone(),
                expected: endpoint.expected_status,
                actual: status,
            });
        }

        let text = response.text().await?;
        if status == 200 {
            if text.trim().is_empty() {
                return Err(HarnessError::Assertion(format!(
                    "response body of {} is empty",
                    endpoint.url
                )));
            }
            if !endpoint.is_download {
                match serde_json::from_str::<Value>(&text) {
                    Ok(value) => self.check_structured(endpoint, &value)?,
                    Err(_) => html::verify_markup(&text, endpoint)?,
                }
            }
        }

        let downloaded = if endpoint.is_download {
            Some(self.download(endpoint).await?)
        } else {
            None
        };

        Ok(Outcome {
            url: endpoint.url.clone(),
            status,
            interceptions,
            table_rows,
            downloaded,
        })
    }

    /// Issue the raw request for a benchmark pass: transport failures are
    /// honored, assertions are not.
    pub async fn time_request(&self, endpoint: &Endpoint, timeout: Duration) -> HarnessResult<()> {
        let response = self
            .issue(endpoint, timeout)
            .await
            .map_err(|err| request_error(endpoint, timeout, err))?;
        if endpoint.fail_on_status_code && !response.status().is_success() {
            return Err(HarnessError::Transport {
                url: endpoint.url.clone(),
                reason: format!("unexpected status {}", response.status().as_u16()),
            });
        }
        // Drain the body so the measurement covers the full transfer.
        let _ = response.bytes().await?;
        Ok(())
    }

    async fn issue(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let method = Method::from_bytes(endpoint.method.to_uppercase().as_bytes())
            .unwrap_or(Method::GET);
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.url
        );

        let mut request = self.client.request(method, &url).timeout(timeout);
        if !endpoint.qs.is_empty() {
            request = request.query(&endpoint.qs);
        }
        for (name, value) in &endpoint.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &endpoint.body {
            let empty_object = body.as_object().map(|o| o.is_empty()).unwrap_or(false);
            if !body.is_null() && !empty_object {
                request = request.json(body);
            }
        }
        request.send().await
    }

    fn check_structured(&self, endpoint: &Endpoint, value: &Value) -> HarnessResult<()> {
        if let Some(keys) = &endpoint.expected_keys {
            let object = value.as_object().ok_or_else(|| {
                HarnessError::Assertion(format!(
                    "expected a JSON object from {}, got {}",
                    endpoint.url,
                    type_name(value)
                ))
            })?;
            for key in keys {
                let field = object.get(key).ok_or_else(|| {
                    HarnessError::Assertion(format!(
                        "response from {} is missing key \"{key}\"",
                        endpoint.url
                    ))
                })?;
                if let Some(s) = field.as_str() {
                    if s.is_empty() {
                        return Err(HarnessError::Assertion(format!(
                            "key \"{key}\" of {} is an empty string",
                            endpoint.url
                        )));
                    }
                } else if let Some(n) = field.as_f64() {
                    if n.is_nan() {
                        return Err(HarnessError::Assertion(format!(
                            "key \"{key}\" of {} is NaN",
                            endpoint.url
                        )));
                    }
                }
            }
        }

        if let Some(pairs) = &endpoint.expected_key_values {
            for (key, expected) in pairs {
                let field = value.get(key).ok_or_else(|| {
                    HarnessError::Assertion(format!(
                        "response from {} is missing key \"{key}\"",
                        endpoint.url
                    ))
                })?;
                if field != expected {
                    return Err(HarnessError::Assertion(format!(
                        "expected key \"{key}\" of {} to equal {expected}, got {field}",
                        endpoint.url
                    )));
                }
            }
        }

        if let Some(min) = endpoint.result_array_min_len {
            let array = value.as_array().ok_or_else(|| {
                HarnessError::Assertion(format!(
                    "expected a JSON array from {}, got {}",
                    endpoint.url,
                    type_name(value)
                ))
            })?;
            if array.len() < min {
                return Err(HarnessError::Assertion(format!(
                    "expected at least {min} results from {}, got {}",
                    endpoint.url,
                    array.len()
                )));
            }
        }

        Ok(())
    }

    /// Fetch a download endpoint into the downloads directory, bounded by the
    /// download timeout, and assert non-zero size on disk.
    async fn download(&self, endpoint: &Endpoint) -> HarnessResult<PathBuf> {
        let mut url = Url::parse(&format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.url
        ))
        .map_err(|e| HarnessError::SuiteParse(format!("bad download url {}: {e}", endpoint.url)))?;
        url.query_pairs_mut()
            .extend_pairs(endpoint.qs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let budget = Duration::from_millis(self.config.download_timeout_ms);
        let fetched = tokio::time::timeout(budget, async {
            let response = self.client.get(url.clone()).send().await?;
            response.bytes().await
        })
        .await
        .map_err(|_| HarnessError::Timeout {
            what: format!("download of {}", endpoint.url),
            budget_ms: self.config.download_timeout_ms,
        })?;

        let bytes = fetched.map_err(|err| HarnessError::Transport {
            url: endpoint.url.clone(),
            reason: err.to_string(),
        })?;

        let path = self.config.downloads_dir.join(endpoint.download_file_name());
        std::fs::write(&path, &bytes)?;

        let size = std::fs::metadata(&path)?.len();
        if size == 0 {
            return Err(HarnessError::Assertion(format!(
                "downloaded file {} has zero bytes on disk",
                path.display()
            )));
        }
        Ok(path)
    }
}

/// The rendered table must hold strictly more rows than the configured
/// minimum; the failure names the observed count.
fn check_table(endpoint: &Endpoint, rows: usize) -> HarnessResult<()> {
    if let (Some(table_id), Some(min)) = (&endpoint.table_id, endpoint.table_min_len) {
        if rows <= min {
            return Err(HarnessError::Assertion(format!(
                "expected more than {min} rows in #{table_id} on {}, found {rows}",
                endpoint.url
            )));
        }
    }
    Ok(())
}

/// Timeouts are reported distinctly from other transport failures.
fn request_error(endpoint: &Endpoint, timeout: Duration, err: reqwest::Error) -> HarnessError {
    if err.is_timeout() {
        HarnessError::Timeout {
            what: format!("request to {}", endpoint.url),
            budget_ms: timeout.as_millis() as u64,
        }
    } else {
        HarnessError::Transport {
            url: endpoint.url.clone(),
            reason: err.to_string(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_must_exceed_the_minimum_row_count() {
        let mut endpoint = Endpoint::get("/bin");
        endpoint.table_id = Some("ancillaryTable".to_string());
        endpoint.table_min_len = Some(10);

        assert!(check_table(&endpoint, 11).is_ok());

        // Exactly the minimum is not enough.
        let err = check_table(&endpoint, 10).unwrap_err();
        assert!(err.to_string().contains("#ancillaryTable"));
        assert!(err.to_string().contains("found 10"));

        let err = check_table(&endpoint, 0).unwrap_err();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn endpoints_without_table_fields_skip_the_check() {
        let endpoint = Endpoint::get("/about");
        assert!(check_table(&endpoint, 0).is_ok());
    }
}
