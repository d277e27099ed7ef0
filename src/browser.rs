//! Playwright browser automation
//!
//! The bridge drives Playwright the way the rest of the harness drives
//! reqwest: build a script as a string, run it with `node`, and parse the
//! single `PORTAL_REPORT` JSON line it prints. Page rendering arms network
//! interception before navigating and drains in-flight API calls before the
//! report is emitted, so the Rust side only ever sees a settled capture set.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{HarnessError, HarnessResult};
use crate::intercept::RawCapture;
use crate::journey::{Journey, JourneyStep};

#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Configuration for the browser bridge.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Base URL of the portal under test.
    pub base_url: String,

    /// Directory where journey downloads are saved.
    pub downloads_dir: PathBuf,

    /// Path prefix identifying API calls to intercept during page renders.
    pub api_prefix: String,

    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,

    /// Budget for the page's network activity to settle after navigation.
    pub settle_timeout_ms: u64,

    /// Overall budget for one generated script run.
    pub script_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            downloads_dir: PathBuf::from("test-results/downloads"),
            api_prefix: "/api/".to_string(),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            settle_timeout_ms: 15_000,
            script_timeout_ms: 60_000,
        }
    }
}

/// Everything observed while rendering one page.
#[derive(Debug, Clone, Deserialize)]
pub struct PageReport {
    /// Raw interception captures for API calls, in completion order.
    pub captures: Vec<RawCapture>,

    /// `tbody tr` count for the descriptor's `table_id`, when requested.
    pub table_rows: Option<usize>,

    /// Visible body text of the rendered page.
    pub body_text: String,

    /// False when network activity did not settle within the budget.
    pub settled: bool,

    /// Status of the navigation response itself. Set when the visit hit an
    /// error status and the script bailed out before DOM capture.
    #[serde(default)]
    pub visit_status: Option<u16>,
}

/// Per-step outcome of a journey run.
#[derive(Debug, Clone, Deserialize)]
pub struct StepOutcome {
    pub label: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JourneyReport {
    pub success: bool,
    pub steps: Vec<StepOutcome>,
}

/// Handle to the Playwright installation.
pub struct BrowserBridge {
    config: BrowserConfig,
}

impl BrowserBridge {
    pub fn new(config: BrowserConfig) -> HarnessResult<Self> {
        Self::check_playwright_installed()?;
        std::fs::create_dir_all(&config.downloads_dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    fn check_playwright_installed() -> HarnessResult<()> {
        let status = std::process::Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::PlaywrightNotFound),
        }
    }

    /// Render a page with interception armed on the API prefix and wait for
    /// in-flight calls to drain. Zero intercepted calls is a valid outcome.
    pub async fn render_page(&self, endpoint: &Endpoint) -> HarnessResult<PageReport> {
        let script = self.build_render_script(endpoint);
        let stdout = self.run_script(&script).await?;
        parse_report(&stdout)
    }

    /// Execute a journey, stopping on the first failing step.
    pub async fn run_journey(&self, journey: &Journey) -> HarnessResult<JourneyReport> {
        let script = self.build_journey_script(journey);
        let stdout = self.run_script(&script).await?;
        parse_report(&stdout)
    }

    /// Script that visits a page, captures API interceptions with timing, and
    /// reports table row counts and body text.
    pub fn build_render_script(&self, endpoint: &Endpoint) -> String {
        let qs_json = serde_json::to_string(&endpoint.qs).unwrap_or_else(|_| "[]".to_string());
        let table_id = match &endpoint.table_id {
            Some(id) => js_str(id),
            None => "null".to_string(),
        };

        format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();

  const base = {base_url};
  const apiPrefix = {api_prefix};
  const armMs = Date.now();
  const captures = [];
  const inflight = [];
  const startedAt = new Map();

  page.on('request', (req) => {{
    startedAt.set(req, Date.now() - armMs);
  }});
  page.on('response', (resp) => {{
    let pathname;
    try {{ pathname = new URL(resp.url()).pathname; }} catch (e) {{ return; }}
    if (!pathname.startsWith(apiPrefix)) return;
    const started = startedAt.get(resp.request()) || 0;
    inflight.push((async () => {{
      let body = '';
      try {{ body = await resp.text(); }} catch (e) {{ /* binary or aborted */ }}
      captures.push({{
        url: resp.url(),
        method: resp.request().method(),
        status: resp.status(),
        body: body,
        started_ms: started,
        completed_ms: Date.now() - armMs,
      }});
    }})());
  }});

  const target = new URL({url}, base);
  for (const [key, value] of {qs_json}) {{
    target.searchParams.append(key, value);
  }}

  let settled = true;
  const resp = await page.goto(target.toString());
  if ({fail_on_status} && resp && resp.status() >= 400) {{
    console.log('PORTAL_REPORT ' + JSON.stringify({{
      captures: [], table_rows: null, body_text: '', settled: true,
      visit_status: resp.status(),
    }}));
    await browser.close();
    process.exit(0);
  }}
  try {{
    await page.waitForLoadState('networkidle', {{ timeout: {settle_ms} }});
  }} catch (e) {{
    settled = false;
  }}
  await Promise.all(inflight);

  const tableId = {table_id};
  let tableRows = null;
  if (tableId !== null) {{
    tableRows = await page.locator('#' + tableId + ' tbody tr').count();
  }}
  const bodyText = await page.evaluate(() => document.body ? document.body.innerText : '');

  console.log('PORTAL_REPORT ' + JSON.stringify({{
    captures: captures,
    table_rows: tableRows,
    body_text: bodyText,
    settled: settled,
    visit_status: resp ? resp.status() : null,
  }}));
  await browser.close();
}})();
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
            base_url = js_str(&self.config.base_url),
            api_prefix = js_str(&self.config.api_prefix),
            url = js_str(&endpoint.url),
            qs_json = qs_json,
            fail_on_status = endpoint.fail_on_status_code,
            settle_ms = self.config.settle_timeout_ms,
            table_id = table_id,
        )
    }

    /// Script that executes journey steps in order, recording per-step
    /// outcomes and stopping on the first failure.
    pub fn build_journey_script(&self, journey: &Journey) -> String {
        let mut body = String::new();
        for step in &journey.steps {
            body.push_str(&format!(
                "    await step({label}, async () => {{\n{code}\n    }});\n",
                label = js_str(&step.label()),
                code = self.step_to_js(step),
            ));
        }

        format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');
const fs = require('fs');
const path = require('path');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }},
    acceptDownloads: true,
  }});
  const page = await context.newPage();

  const base = {base_url};
  const downloadsDir = {downloads_dir};
  const steps = [];
  let success = true;

  async function step(label, fn) {{
    const t0 = Date.now();
    try {{
      await fn();
      steps.push({{ label: label, success: true, duration_ms: Date.now() - t0, error: null }});
    }} catch (e) {{
      steps.push({{
        label: label,
        success: false,
        duration_ms: Date.now() - t0,
        error: String((e && e.message) || e),
      }});
      throw e;
    }}
  }}

  try {{
{body}  }} catch (e) {{
    success = false;
  }} finally {{
    console.log('PORTAL_REPORT ' + JSON.stringify({{ success: success, steps: steps }}));
    await browser.close();
  }}
}})();
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
            base_url = js_str(&self.config.base_url),
            downloads_dir = js_str(self.config.downloads_dir.to_string_lossy().as_ref()),
            body = body,
        )
    }

    fn step_to_js(&self, step: &JourneyStep) -> String {
        match step {
            JourneyStep::Visit { url } => {
                format!("      await page.goto(new URL({}, base).toString());", js_str(url))
            }
            JourneyStep::WaitMs { ms } => format!("      await page.waitForTimeout({ms});"),
            JourneyStep::Fill {
                selector,
                text,
                clear_first,
            } => {
                let clear = if *clear_first {
                    format!("      await page.fill({}, '');\n", js_str(selector))
                } else {
                    String::new()
                };
                format!("{clear}      await page.fill({}, {});", js_str(selector), js_str(text))
            }
            JourneyStep::Click { selector } => {
                format!("      await page.click({});", js_str(selector))
            }
            JourneyStep::ClickContains { selector, text } => format!(
                "      await page.locator({}, {{ hasText: {} }}).first().click();",
                js_str(selector),
                js_str(text)
            ),
            JourneyStep::ExpectUrlContains { fragment } => format!(
                "      if (!page.url().includes({frag})) {{ throw new Error('expected url to contain ' + {frag} + ', got ' + page.url()); }}",
                frag = js_str(fragment)
            ),
            JourneyStep::ExpectNumberText {
                selector,
                greater_than,
            } => format!(
                r#"      const text = (await page.locator({sel}).first().innerText()).trim();
      const value = Number(text);
      if (!(value > {bound})) {{ throw new Error('expected ' + {sel} + ' to show a number greater than {bound}, got "' + text + '"'); }}"#,
                sel = js_str(selector),
                bound = greater_than
            ),
            JourneyStep::ExpectTextEquals { selector, value } => format!(
                r#"      const text = (await page.locator({sel}).first().innerText()).trim();
      if (text !== {value}) {{ throw new Error('expected ' + {sel} + ' to equal ' + {value} + ', got "' + text + '"'); }}"#,
                sel = js_str(selector),
                value = js_str(value)
            ),
            JourneyStep::ExpectTextMinLen { selector, min_len } => format!(
                r#"      const text = (await page.locator({sel}).first().innerText());
      if (text.length < {min_len}) {{ throw new Error('expected ' + {sel} + ' text of at least {min_len} chars, got ' + text.length); }}"#,
                sel = js_str(selector),
                min_len = min_len
            ),
            JourneyStep::ExpectAttrEquals {
                selector,
                attr,
                value,
            } => format!(
                r#"      const attr = await page.locator({sel}).first().getAttribute({attr});
      if (attr !== {value}) {{ throw new Error('expected ' + {sel} + ' attribute ' + {attr} + ' to equal ' + {value} + ', got "' + attr + '"'); }}"#,
                sel = js_str(selector),
                attr = js_str(attr),
                value = js_str(value)
            ),
            JourneyStep::DownloadClick {
                selector,
                file_name,
                min_bytes,
                expect_contains,
                timeout_ms,
            } => {
                let contains = match expect_contains {
                    Some(needle) => format!(
                        r#"
      const content = fs.readFileSync(target, 'utf8');
      if (!content.includes({needle})) {{ throw new Error('downloaded ' + {name} + ' does not contain ' + {needle}); }}"#,
                        needle = js_str(needle),
                        name = js_str(file_name)
                    ),
                    None => String::new(),
                };
                format!(
                    r#"      const pending = page.waitForEvent('download', {{ timeout: {timeout} }});
      await page.click({sel});
      const download = await pending;
      const target = path.join(downloadsDir, {name});
      await download.saveAs(target);
      const size = fs.statSync(target).size;
      if (!(size > {min_bytes})) {{ throw new Error('downloaded ' + {name} + ' has size ' + size + ' bytes'); }}{contains}"#,
                    timeout = timeout_ms,
                    sel = js_str(selector),
                    name = js_str(file_name),
                    min_bytes = min_bytes,
                    contains = contains,
                )
            }
        }
    }

    /// Write the script to a temp dir and run it with node, bounded by the
    /// script timeout. Returns stdout; the report line is parsed even when
    /// the script exits non-zero so step failures keep their context.
    async fn run_script(&self, script: &str) -> HarnessResult<String> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("portal-check.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let budget = Duration::from_millis(self.config.script_timeout_ms);
        let output = tokio::time::timeout(
            budget,
            TokioCommand::new("node").arg(&script_path).output(),
        )
        .await
        .map_err(|_| HarnessError::Timeout {
            what: "browser script".to_string(),
            budget_ms: self.config.script_timeout_ms,
        })??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() && !stdout.contains("PORTAL_REPORT") {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::Browser(format!(
                "script failed:\nstdout: {stdout}\nstderr: {stderr}"
            )));
        }
        Ok(stdout)
    }
}

/// Serialize a string as a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Extract and deserialize the report line from script stdout.
fn parse_report<T: serde::de::DeserializeOwned>(stdout: &str) -> HarnessResult<T> {
    let re = regex::Regex::new(r"(?m)^PORTAL_REPORT (.+)$")
        .map_err(|e| HarnessError::Browser(e.to_string()))?;
    let captures = re.captures(stdout).ok_or_else(|| {
        HarnessError::Browser(format!("no report in script output:\n{stdout}"))
    })?;
    Ok(serde_json::from_str(&captures[1])?)
}
