//! Declarative multi-step user journeys
//!
//! A journey chains browser interactions into one user-flow test: visit,
//! type into the search bar, click through results, assert on the URL and
//! rendered numbers, download files. Steps execute in order and the journey
//! stops on the first failing step.

use serde::{Deserialize, Serialize};

/// A named sequence of browser interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub steps: Vec<JourneyStep>,
}

/// A single interaction or assertion within a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum JourneyStep {
    /// Navigate to a URL relative to the base.
    Visit { url: String },

    /// Fixed wait, for pages that populate after document-ready.
    WaitMs { ms: u64 },

    /// Fill an input field.
    Fill {
        selector: String,
        text: String,
        #[serde(default)]
        clear_first: bool,
    },

    /// Click an element.
    Click { selector: String },

    /// Click the element matching `selector` whose text contains `text`.
    ClickContains { selector: String, text: String },

    /// The current URL must contain this fragment.
    ExpectUrlContains { fragment: String },

    /// The element's trimmed text must parse as a number greater than the
    /// bound.
    ExpectNumberText { selector: String, greater_than: f64 },

    /// The element's trimmed text must equal this value exactly.
    ExpectTextEquals { selector: String, value: String },

    /// The element's text must be at least this long.
    ExpectTextMinLen { selector: String, min_len: usize },

    /// The element's attribute must equal this value.
    ExpectAttrEquals {
        selector: String,
        attr: String,
        value: String,
    },

    /// Click a download link and wait for the file to land on disk, bounded.
    /// The saved file must have non-zero size and, when `expect_contains` is
    /// set, contain that identifier.
    DownloadClick {
        selector: String,
        file_name: String,
        #[serde(default)]
        min_bytes: u64,
        #[serde(default)]
        expect_contains: Option<String>,
        #[serde(default = "default_download_timeout")]
        timeout_ms: u64,
    },
}

fn default_download_timeout() -> u64 {
    15_000
}

impl JourneyStep {
    /// Short label used in step reports and failure messages.
    pub fn label(&self) -> String {
        match self {
            JourneyStep::Visit { url } => format!("visit:{url}"),
            JourneyStep::WaitMs { ms } => format!("wait:{ms}ms"),
            JourneyStep::Fill { selector, .. } => format!("fill:{selector}"),
            JourneyStep::Click { selector } => format!("click:{selector}"),
            JourneyStep::ClickContains { selector, text } => {
                format!("click:{selector}:{text}")
            }
            JourneyStep::ExpectUrlContains { fragment } => format!("url-contains:{fragment}"),
            JourneyStep::ExpectNumberText { selector, .. } => format!("number:{selector}"),
            JourneyStep::ExpectTextEquals { selector, .. } => format!("text-equals:{selector}"),
            JourneyStep::ExpectTextMinLen { selector, .. } => format!("text-min-len:{selector}"),
            JourneyStep::ExpectAttrEquals { selector, attr, .. } => {
                format!("attr:{selector}:{attr}")
            }
            JourneyStep::DownloadClick { file_name, .. } => format!("download:{file_name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_journey_from_yaml() {
        let yaml = r##"
name: search-canada
description: View the search page and search for specimens in Canada
steps:
  - action: visit
    url: /search
  - action: fill
    selector: "#query"
    text: Canada
  - action: click_contains
    selector: .dropdown-item
    text: Canada[geo]
  - action: click_contains
    selector: button
    text: Search
  - action: expect_url_contains
    fragment: query=Canada[geo]
"##;
        let journey: Journey = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(journey.name, "search-canada");
        assert_eq!(journey.steps.len(), 5);
        assert_eq!(journey.steps[0].label(), "visit:/search");
    }

    #[test]
    fn download_step_defaults() {
        let yaml = r#"
action: download_click
selector: 'a[download="BOLD:ACF4938.tsv"]'
file_name: BOLD_ACF4938.tsv
expect_contains: ABLCW913-10
"#;
        let step: JourneyStep = serde_yaml::from_str(yaml).unwrap();
        match step {
            JourneyStep::DownloadClick {
                timeout_ms,
                min_bytes,
                expect_contains,
                ..
            } => {
                assert_eq!(timeout_ms, 15_000);
                assert_eq!(min_bytes, 0);
                assert_eq!(expect_contains.as_deref(), Some("ABLCW913-10"));
            }
            other => panic!("expected DownloadClick, got {}", other.label()),
        }
    }
}
