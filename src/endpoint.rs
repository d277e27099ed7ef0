//! Declarative endpoint descriptors and YAML suite loading

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HarnessError, HarnessResult};

/// One endpoint or page under test.
///
/// Every field beyond `url` is optional with a documented effect: if a field
/// is present, the verifier asserts it. Descriptors are immutable once loaded;
/// suites construct them statically from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Endpoint {
    /// Path plus optional query template, relative to the base URL.
    pub url: String,

    /// HTTP verb, upper-cased on use.
    #[serde(default = "default_method")]
    pub method: String,

    /// Opaque request payload, sent as JSON when present.
    #[serde(default)]
    pub body: Option<serde_json::Value>,

    /// Query parameters, ordered. Serialized in declaration order.
    #[serde(default)]
    pub qs: Vec<(String, String)>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Expected response status for the raw check.
    #[serde(default = "default_status")]
    pub expected_status: u16,

    /// When true, a non-2xx transport result aborts the test before any
    /// assertion runs; when false, the status assertion reports it.
    #[serde(default = "default_true")]
    pub fail_on_status_code: bool,

    /// Download endpoints skip page rendering and DOM assertions entirely.
    #[serde(default)]
    pub is_download: bool,

    /// Saved-file name for downloads; derived from the URL when absent.
    #[serde(default)]
    pub download_name: Option<String>,

    /// In-browser table assertion: `#<table_id> tbody tr` count must exceed
    /// `table_min_len`.
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub table_min_len: Option<usize>,

    /// Required fields of a structured (JSON) response body.
    #[serde(default)]
    pub expected_keys: Option<Vec<String>>,

    /// Exact-value checks on structured response fields.
    #[serde(default)]
    pub expected_key_values: Option<Vec<(String, serde_json::Value)>>,

    /// The structured body must be an array of at least this length.
    #[serde(default)]
    pub result_array_min_len: Option<usize>,

    /// Exact rendered body text (lookup pages derive this from the URL
    /// suffix). Pages with this set skip the title-presence check.
    #[serde(default)]
    pub expected_body_text: Option<String>,

    /// Per-request timeout override in milliseconds.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

fn default_true() -> bool {
    true
}

impl Endpoint {
    /// Minimal descriptor: GET, expecting 200, no extra assertions.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            body: None,
            qs: Vec::new(),
            headers: Vec::new(),
            expected_status: default_status(),
            fail_on_status_code: true,
            is_download: false,
            download_name: None,
            table_id: None,
            table_min_len: None,
            expected_keys: None,
            expected_key_values: None,
            result_array_min_len: None,
            expected_body_text: None,
            request_timeout_ms: None,
        }
    }

    /// Descriptor invariants checked at load time.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.url.trim().is_empty() {
            return Err(HarnessError::SuiteParse(
                "endpoint url must not be empty".to_string(),
            ));
        }
        if self.method.trim().is_empty()
            || reqwest::Method::from_bytes(self.method.to_uppercase().as_bytes()).is_err()
        {
            return Err(HarnessError::SuiteParse(format!(
                "endpoint {} has an invalid method \"{}\"",
                self.url, self.method
            )));
        }
        if self.table_id.is_some() != self.table_min_len.is_some() {
            return Err(HarnessError::SuiteParse(format!(
                "endpoint {} must set table_id and table_min_len together",
                self.url
            )));
        }
        Ok(())
    }

    /// Saved-file name for a download, sanitized from the URL when no
    /// explicit name is given.
    pub fn download_file_name(&self) -> String {
        match &self.download_name {
            Some(name) => name.clone(),
            None => self
                .url
                .trim_start_matches('/')
                .replace(['/', ':'], "_"),
        }
    }
}

/// A named group of endpoint descriptors, parsed from one YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    /// Unique name, used as the results title prefix and benchmark key.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Which benchmark artifact this suite's measurements merge into.
    #[serde(default)]
    pub benchmark_artifact: Option<String>,

    pub endpoints: Vec<Endpoint>,
}

impl Suite {
    /// Parse a suite from a YAML string.
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let suite: Suite = serde_yaml::from_str(yaml)?;
        for endpoint in &suite.endpoints {
            endpoint.validate()?;
        }
        Ok(suite)
    }

    /// Parse a suite from a YAML file.
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all suites from a directory, sorted by file name so execution
    /// order is stable across runs.
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        paths.sort();

        let mut suites = Vec::new();
        for path in paths {
            suites.push(Self::from_file(&path)?);
        }
        Ok(suites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_endpoint_applies_defaults() {
        let yaml = r#"
name: views
endpoints:
  - url: /about
"#;
        let suite = Suite::from_yaml(yaml).unwrap();
        let e = &suite.endpoints[0];
        assert_eq!(e.method, "GET");
        assert_eq!(e.expected_status, 200);
        assert!(e.fail_on_status_code);
        assert!(!e.is_download);
        assert!(e.qs.is_empty());
    }

    #[test]
    fn parse_full_endpoint() {
        let yaml = r#"
name: services
benchmark_artifact: benchmark_api.json
endpoints:
  - url: /api/maps/eAFLT823
    qs:
      - [offset, "0"]
    expected_status: 200
    fail_on_status_code: true
    is_download: true
  - url: /bin
    table_id: ancillaryTable
    table_min_len: 10
"#;
        let suite = Suite::from_yaml(yaml).unwrap();
        assert_eq!(suite.endpoints.len(), 2);
        assert_eq!(suite.endpoints[0].qs, vec![("offset".to_string(), "0".to_string())]);
        assert!(suite.endpoints[0].is_download);
        assert_eq!(suite.endpoints[1].table_id.as_deref(), Some("ancillaryTable"));
        assert_eq!(suite.endpoints[1].table_min_len, Some(10));
    }

    #[test]
    fn empty_url_is_rejected() {
        let yaml = r#"
name: broken
endpoints:
  - url: ""
"#;
        let err = Suite::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("url must not be empty"));
    }

    #[test]
    fn table_fields_must_come_together() {
        let yaml = r#"
name: broken
endpoints:
  - url: /bin
    table_id: resultsTable
"#;
        assert!(Suite::from_yaml(yaml).is_err());
    }

    #[test]
    fn query_order_is_preserved() {
        let yaml = r#"
name: views
endpoints:
  - url: /about
    qs:
      - [query, "geo:province/state:Ontario"]
      - [extent, limited]
"#;
        let suite = Suite::from_yaml(yaml).unwrap();
        let keys: Vec<&str> = suite.endpoints[0].qs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["query", "extent"]);
    }

    #[test]
    fn download_name_derived_from_url() {
        let mut e = Endpoint::get("/api/maps/eAFLT823");
        assert_eq!(e.download_file_name(), "api_maps_eAFLT823");
        e.download_name = Some("BOLD_ACF4938.tsv".to_string());
        assert_eq!(e.download_file_name(), "BOLD_ACF4938.tsv");
    }
}
