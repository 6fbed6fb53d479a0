//! [`ExplorerPage`] over Chrome DevTools Protocol.
//!
//! Reads and most clicks go through small inline scripts, since the explorer's
//! markup changes too often for fixed selectors. Tab clicks use XPath lookups
//! and native clicks so client-side routers see real mouse events.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{ExplorerPage, NextStrategy, TabStrategy};
use crate::config::BrowserSettings;
use crate::error::ScrapeError;
use crate::models::RawRow;

/// One automated browser with a single page, exclusively owned by a run.
///
/// Obtain with [`ChromiumSession::acquire`] and hand back with
/// [`ChromiumSession::release`], which consumes the session.
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: ChromiumPage,
}

impl ChromiumSession {
    pub async fn acquire(settings: &BrowserSettings) -> Result<Self> {
        let chrome_path = match &settings.chrome_executable {
            Some(path) if path.exists() => path.clone(),
            Some(path) => return Err(ScrapeError::BrowserMissingAt(path.clone()).into()),
            None => find_chrome().ok_or(ScrapeError::BrowserUnavailable)?,
        };

        let config = browser_config(&chrome_path, settings)
            .map_err(|e| ScrapeError::BrowserLaunch(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::BrowserLaunch(e.to_string()))?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(ScrapeError::BrowserLaunch(format!("failed to open page: {e}")).into());
            }
        };

        tracing::info!(
            chrome = %chrome_path.display(),
            headless = settings.headless,
            width = settings.window_width,
            height = settings.window_height,
            "Browser session acquired"
        );

        Ok(Self {
            browser,
            handler_task,
            page: ChromiumPage { page },
        })
    }

    pub fn page(&self) -> &ChromiumPage {
        &self.page
    }

    /// Close the browser and stop the CDP handler.
    ///
    /// Failures are logged, not returned: there is nothing a caller could do
    /// with them, and the run's own result must not be masked.
    pub async fn release(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!(error = %e, "Failed to wait for browser exit");
        }
        self.handler_task.abort();
        tracing::info!("Browser session released");
    }
}

fn browser_config(chrome_path: &Path, settings: &BrowserSettings) -> Result<BrowserConfig, String> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .window_size(settings.window_width, settings.window_height)
        .viewport(None)
        .arg(format!("--user-agent={}", settings.user_agent))
        .arg("--disable-gpu")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--no-first-run")
        .arg("--no-default-browser-check");

    if !settings.headless {
        builder = builder.with_head();
    }
    if settings.no_sandbox {
        builder = builder.no_sandbox();
    }

    builder.build()
}

/// Find Chrome/Chromium executable.
pub fn find_chrome() -> Option<PathBuf> {
    for binary in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(binary).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(PathBuf::from(path));
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

/// The single page of a [`ChromiumSession`].
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("Script evaluation failed")?;
        result
            .into_value::<T>()
            .context("Unexpected script result")
    }
}

/// Scripts report "nothing found" as an empty string, since CDP returns no
/// value at all for `null`.
fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Render a Rust string as a JavaScript string literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Render a string as an XPath 1.0 literal, which has no escape syntax.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn tab_xpath(strategy: TabStrategy, label: &str) -> String {
    let lit = xpath_literal(label);
    match strategy {
        TabStrategy::AriaTab => format!("//*[@role='tab'][contains(normalize-space(.), {lit})]"),
        TabStrategy::Button => format!("//button[contains(normalize-space(.), {lit})]"),
        TabStrategy::OwnText => format!(
            "//*[self::div or self::span or self::a or self::li][normalize-space(text())={lit}]"
        ),
        TabStrategy::AnyText => format!("//*[contains(text(), {lit})]"),
    }
}

const LABEL_NEIGHBOUR_JS: &str = r#"
(label) => {
  const ownText = el => Array.from(el.childNodes)
    .filter(n => n.nodeType === Node.TEXT_NODE)
    .map(n => n.textContent)
    .join(' ')
    .replace(/\s+/g, ' ')
    .trim();
  const hasDigit = s => /\d/.test(s);
  const labelled = Array.from(document.querySelectorAll('body *'))
    .filter(el => ownText(el).includes(label));
  for (const el of labelled) {
    let scope = el;
    for (let depth = 0; depth < 3 && scope; depth++) {
      for (let sib = scope.nextElementSibling; sib; sib = sib.nextElementSibling) {
        const text = (sib.innerText || '').trim();
        if (text && hasDigit(text)) {
          return text.split('\n')[0].trim();
        }
      }
      scope = scope.parentElement;
    }
  }
  return '';
}
"#;

const COLLECT_ROWS_JS: &str = r#"
(marker) => {
  const anchors = Array.from(document.querySelectorAll('a[href]'))
    .filter(a => (a.getAttribute('href') || '').includes(marker));
  const seen = new Set();
  const rows = [];
  for (const a of anchors) {
    const row = a.closest('tr, [role="row"]')
      || (a.parentElement && a.parentElement.parentElement)
      || a;
    if (seen.has(row)) continue;
    seen.add(row);
    const cells = Array.from(row.children).map(c => (c.innerText || '').trim());
    rows.push({
      link_text: (a.innerText || '').trim(),
      href: a.href || '',
      row_text: (row.innerText || '').trim(),
      cells,
    });
  }
  return rows;
}
"#;

const ENABLED_JS: &str = r#"
  const enabled = el => !el.disabled
    && el.getAttribute('aria-disabled') !== 'true'
    && !/disabled/i.test(el.getAttribute('class') || '')
    && !(el.parentElement && /disabled/i.test(el.parentElement.getAttribute('class') || ''))
    && el.getClientRects().length > 0;
"#;

fn next_control_js(strategy: NextStrategy) -> String {
    let pick = match strategy {
        NextStrategy::Icon => {
            r#"
  const containers = Array.from(document.querySelectorAll(
    '[class*="pagination" i], [class*="pager" i], nav[aria-label*="pagination" i]'));
  const candidates = containers.flatMap(c =>
    Array.from(c.querySelectorAll('button, [role="button"], a, li'))
      .filter(el => el.querySelector('svg')));
"#
        }
        NextStrategy::Class => {
            r#"
  const candidates = Array.from(document.querySelectorAll(
    '[class*="next" i], [aria-label*="next" i], [title*="next" i]'))
    .filter(el => el.matches('button, [role="button"], a, li') || el.querySelector('svg'));
"#
        }
        NextStrategy::FooterPosition => {
            r#"
  const links = Array.from(document.querySelectorAll('a[href]'));
  const last = links.length ? links[links.length - 1] : null;
  const floor = last ? last.getBoundingClientRect().bottom : 0;
  const candidates = Array.from(document.querySelectorAll('button, [role="button"]'))
    .filter(el => el.getBoundingClientRect().top >= floor);
"#
        }
    };

    format!(
        "(() => {{\n{ENABLED_JS}\n{pick}\n  const usable = candidates.filter(enabled);\n  if (!usable.length) return false;\n  const target = usable[usable.length - 1];\n  target.scrollIntoView({{ block: 'center' }});\n  target.click();\n  return true;\n}})()"
    )
}

#[async_trait::async_trait]
impl ExplorerPage for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn body_text(&self) -> Result<String> {
        self.eval("document.body ? document.body.innerText : ''".to_string())
            .await
    }

    async fn text_near_label(&self, label: &str) -> Result<Option<String>> {
        let text: String = self
            .eval(format!("({LABEL_NEIGHBOUR_JS})({})", js_string(label)))
            .await?;
        Ok(non_empty(text))
    }

    async fn click_tab(&self, strategy: TabStrategy, label: &str) -> Result<bool> {
        let xpath = tab_xpath(strategy, label);
        let elements = match self.page.find_xpaths(xpath.as_str()).await {
            Ok(elements) => elements,
            Err(e) => {
                tracing::debug!(strategy = strategy.name(), error = %e, "Tab lookup failed");
                return Ok(false);
            }
        };

        for element in elements {
            match element.click().await {
                Ok(_) => return Ok(true),
                // Hidden or detached candidates have no box model; try the next.
                Err(e) => tracing::debug!(strategy = strategy.name(), error = %e, "Tab click failed"),
            }
        }
        Ok(false)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        let _: bool = self
            .eval("(() => { window.scrollTo(0, document.body.scrollHeight); return true; })()".to_string())
            .await?;
        Ok(())
    }

    async fn collect_rows(&self, tx_path_marker: &str) -> Result<Vec<RawRow>> {
        self.eval(format!("({COLLECT_ROWS_JS})({})", js_string(tx_path_marker)))
            .await
    }

    async fn click_next(&self, strategy: NextStrategy) -> Result<bool> {
        self.eval(next_control_js(strategy)).await
    }

    async fn resize(&self, width: u32, height: u32) -> Result<()> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.page
            .execute(params)
            .await
            .context("Failed to resize viewport")?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create screenshot dir: {}", parent.display()))?;
        }
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .with_context(|| format!("Failed to save screenshot: {}", path.display()))?;
        Ok(())
    }
}
