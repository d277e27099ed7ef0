//! Rendered-markup content checks
//!
//! Raw page responses are checked without a browser: scripts are stripped,
//! the visible body text is extracted, and the text must contain neither
//! "error" nor "not found". Responses that are not full HTML documents
//! (lookup pages return plain text) are treated as bare body text.

use regex::Regex;

use crate::endpoint::Endpoint;
use crate::error::{HarnessError, HarnessResult};

/// Remove `<script>` blocks, inline content included.
pub fn strip_scripts(html: &str) -> String {
    let re = script_re();
    re.replace_all(html, "").into_owned()
}

fn script_re() -> Regex {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("script pattern compiles")
}

fn tag_re() -> Regex {
    Regex::new(r"(?s)<[^>]*>").expect("tag pattern compiles")
}

fn contains_tag(html: &str, tag: &str) -> bool {
    let re = Regex::new(&format!(r"(?i)<{tag}[\s>]")).expect("tag-presence pattern compiles");
    re.is_match(html)
}

/// Visible text of the document: the `<body>` element's content when one
/// exists, otherwise the whole response, with scripts and tags removed.
pub fn body_text(html: &str) -> String {
    let stripped = strip_scripts(html);
    let body_re = Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("body pattern compiles");
    let inner = match body_re.captures(&stripped) {
        Some(captures) => captures[1].to_string(),
        None => stripped,
    };
    tag_re().replace_all(&inner, "").trim().to_string()
}

/// Assert the rendered-markup rules of a page descriptor against a raw
/// response body.
pub fn verify_markup(raw: &str, endpoint: &Endpoint) -> HarnessResult<()> {
    let is_document = contains_tag(raw, "html");

    if is_document {
        if !contains_tag(raw, "body") {
            return Err(HarnessError::Assertion(format!(
                "page {} has no body element",
                endpoint.url
            )));
        }
        if !contains_tag(raw, "head") {
            return Err(HarnessError::Assertion(format!(
                "page {} has no head element",
                endpoint.url
            )));
        }
        // Pages with an exact body-text expectation skip the title check.
        if endpoint.expected_body_text.is_none() && !contains_tag(raw, "title") {
            return Err(HarnessError::Assertion(format!(
                "page {} has no title element",
                endpoint.url
            )));
        }
    }

    let text = body_text(raw);
    let lowered = text.to_lowercase();
    if lowered.contains("error") {
        return Err(HarnessError::Assertion(format!(
            "rendered body of {} contains \"error\"",
            endpoint.url
        )));
    }
    if lowered.contains("not found") {
        return Err(HarnessError::Assertion(format!(
            "rendered body of {} contains \"not found\"",
            endpoint.url
        )));
    }

    // The lowered text is compared to the expectation as written, so the
    // expectation itself must be lowercase to match.
    if let Some(expected) = &endpoint.expected_body_text {
        if lowered != expected.trim() {
            return Err(HarnessError::Assertion(format!(
                "expected body text of {} to equal \"{}\", got \"{}\"",
                endpoint.url, expected, text
            )));
        }
    }

    Ok(())
}
