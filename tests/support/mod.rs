#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use suiscrape::browser::{ExplorerPage, NextStrategy, TabStrategy};
use suiscrape::config::{Config, TimingConfig};
use suiscrape::events::{ScrapeEvent, ScrapeObserver};
use suiscrape::models::RawRow;
use suiscrape::pace::RecordingPacer;
use suiscrape::Scraper;

pub const TX_BASE: &str = "https://suiscan.xyz/mainnet/tx";

/// A transaction row the way the explorer renders one.
pub fn row(hash: &str, when: &str) -> RawRow {
    RawRow {
        link_text: hash.to_string(),
        href: format!("{TX_BASE}/{hash}"),
        row_text: format!("{hash}\tTransferSui\t{when}\t0.00199 SUI"),
        cells: vec![
            hash.to_string(),
            "TransferSui".to_string(),
            when.to_string(),
            "0.00199 SUI".to_string(),
        ],
    }
}

/// One page of rows, aged one minute apart.
pub fn page_of(hashes: &[&str]) -> Vec<RawRow> {
    hashes
        .iter()
        .enumerate()
        .map(|(i, h)| row(h, &format!("{} mins ago", i + 1)))
        .collect()
}

pub fn hashes(records: &[suiscrape::models::TransactionRecord]) -> Vec<&str> {
    records.iter().map(|r| r.hash.as_str()).collect()
}

#[derive(Debug)]
struct FakeState {
    pages: Vec<Vec<RawRow>>,
    current: usize,
    /// Rows returned by a specific (1-based) collect call instead of the
    /// current page.
    collect_overrides: HashMap<usize, Vec<RawRow>>,
    collect_calls: usize,
    fail_collect_at: Option<usize>,
    next_strategies: Vec<NextStrategy>,
    stuck: bool,
    next_attempts: Vec<NextStrategy>,
    body: String,
    activity_markers_text: String,
    tab_strategies: Vec<TabStrategy>,
    activity_after: Option<usize>,
    activity_clicks: usize,
    tab_clicks: Vec<(TabStrategy, String)>,
    near_label: HashMap<String, String>,
    fail_navigation: bool,
    navigated: Vec<String>,
    viewport: Option<(u32, u32)>,
    screenshots: Vec<PathBuf>,
}

/// Scripted stand-in for an explorer page.
///
/// Clicking "next" moves to the following page while one exists. The
/// activity markers show up after a configurable number of activity clicks.
#[derive(Debug, Clone)]
pub struct FakeExplorerPage {
    state: Arc<Mutex<FakeState>>,
}

impl FakeExplorerPage {
    pub fn new(pages: Vec<Vec<RawRow>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                pages,
                current: 0,
                collect_overrides: HashMap::new(),
                collect_calls: 0,
                fail_collect_at: None,
                next_strategies: vec![NextStrategy::Icon],
                stuck: false,
                next_attempts: Vec::new(),
                body: "Account Overview\nSUI Balance\n1,234.5678 SUI\nCoins Objects Activity"
                    .to_string(),
                activity_markers_text: "Type Digest Time Gas Fee".to_string(),
                tab_strategies: vec![TabStrategy::Button],
                activity_after: Some(1),
                activity_clicks: 0,
                tab_clicks: Vec::new(),
                near_label: HashMap::new(),
                fail_navigation: false,
                navigated: Vec::new(),
                viewport: None,
                screenshots: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake page lock poisoned")
    }

    pub fn with_collect_override(self, call: usize, rows: Vec<RawRow>) -> Self {
        self.lock().collect_overrides.insert(call, rows);
        self
    }

    pub fn failing_collect_at(self, call: usize) -> Self {
        self.lock().fail_collect_at = Some(call);
        self
    }

    pub fn with_next_strategies(self, strategies: &[NextStrategy]) -> Self {
        self.lock().next_strategies = strategies.to_vec();
        self
    }

    /// "Next" controls exist and click, but the page never changes.
    pub fn stuck(self) -> Self {
        self.lock().stuck = true;
        self
    }

    pub fn with_body(self, body: &str) -> Self {
        self.lock().body = body.to_string();
        self
    }

    pub fn with_near_label(self, label: &str, value: &str) -> Self {
        self.lock()
            .near_label
            .insert(label.to_string(), value.to_string());
        self
    }

    pub fn with_tab_strategies(self, strategies: &[TabStrategy]) -> Self {
        self.lock().tab_strategies = strategies.to_vec();
        self
    }

    /// Markers appear once the activity tab has been clicked `clicks` times.
    pub fn with_activity_after(self, clicks: usize) -> Self {
        self.lock().activity_after = Some(clicks);
        self
    }

    pub fn activity_never(self) -> Self {
        self.lock().activity_after = None;
        self
    }

    pub fn failing_navigation(self) -> Self {
        self.lock().fail_navigation = true;
        self
    }

    pub fn collect_calls(&self) -> usize {
        self.lock().collect_calls
    }

    pub fn next_attempts(&self) -> Vec<NextStrategy> {
        self.lock().next_attempts.clone()
    }

    pub fn tab_clicks(&self) -> Vec<(TabStrategy, String)> {
        self.lock().tab_clicks.clone()
    }

    pub fn activity_clicks(&self) -> usize {
        self.lock().activity_clicks
    }

    pub fn navigated(&self) -> Vec<String> {
        self.lock().navigated.clone()
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.lock().viewport
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock().screenshots.clone()
    }
}

#[async_trait]
impl ExplorerPage for FakeExplorerPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_navigation {
            anyhow::bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        state.navigated.push(url.to_string());
        Ok(())
    }

    async fn body_text(&self) -> Result<String> {
        let state = self.lock();
        let showing = state
            .activity_after
            .is_some_and(|after| state.activity_clicks >= after);
        if showing {
            Ok(format!("{}\n{}", state.body, state.activity_markers_text))
        } else {
            Ok(state.body.clone())
        }
    }

    async fn text_near_label(&self, label: &str) -> Result<Option<String>> {
        Ok(self.lock().near_label.get(label).cloned())
    }

    async fn click_tab(&self, strategy: TabStrategy, label: &str) -> Result<bool> {
        let mut state = self.lock();
        if !state.tab_strategies.contains(&strategy) {
            return Ok(false);
        }
        state.tab_clicks.push((strategy, label.to_string()));
        if label == "Activity" {
            state.activity_clicks += 1;
        }
        Ok(true)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        Ok(())
    }

    async fn collect_rows(&self, tx_path_marker: &str) -> Result<Vec<RawRow>> {
        let mut state = self.lock();
        state.collect_calls += 1;
        let call = state.collect_calls;
        if state.fail_collect_at == Some(call) {
            anyhow::bail!("Target closed");
        }
        let rows = match state.collect_overrides.get(&call) {
            Some(rows) => rows.clone(),
            None => state.pages.get(state.current).cloned().unwrap_or_default(),
        };
        Ok(rows
            .into_iter()
            .filter(|r| r.href.is_empty() || r.href.contains(tx_path_marker))
            .collect())
    }

    async fn click_next(&self, strategy: NextStrategy) -> Result<bool> {
        let mut state = self.lock();
        state.next_attempts.push(strategy);
        if !state.next_strategies.contains(&strategy) {
            return Ok(false);
        }
        if state.stuck {
            return Ok(true);
        }
        // A disabled control on the last page counts as absent.
        if state.current + 1 >= state.pages.len() {
            return Ok(false);
        }
        state.current += 1;
        Ok(true)
    }

    async fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.lock().viewport = Some((width, height));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"\x89PNG fake")?;
        self.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }
}

/// Keeps a compact trace of every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<String>,
}

impl ScrapeObserver for RecordingObserver {
    fn on_event(&mut self, event: &ScrapeEvent<'_>) {
        let line = match event {
            ScrapeEvent::Navigating { url } => format!("navigating {url}"),
            ScrapeEvent::BalanceRead { balance } => format!("balance {balance}"),
            ScrapeEvent::SwitchingView => "switching".to_string(),
            ScrapeEvent::ActivityReady => "activity".to_string(),
            ScrapeEvent::PageStarted { page, max_pages } => format!("page {page}/{max_pages}"),
            ScrapeEvent::PageScraped {
                page,
                added,
                records,
                ..
            } => format!("scraped {page} +{added} ={}", records.len()),
            ScrapeEvent::Advanced { page, strategy } => {
                format!("advanced {page} via {}", strategy.name())
            }
            ScrapeEvent::Stopped { reason } => format!("stopped {reason}"),
        };
        self.events.push(line);
    }
}

/// Default config with every wait zeroed.
pub fn fast_config() -> Config {
    Config {
        timing: TimingConfig::immediate(),
        ..Config::default()
    }
}

pub fn fast_scraper(config: Config) -> (Scraper, Arc<RecordingPacer>) {
    let pacer = Arc::new(RecordingPacer::new());
    let scraper = Scraper::new(config).with_pacer(pacer.clone());
    (scraper, pacer)
}
