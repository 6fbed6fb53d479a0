//! Pagination-driven row scraping.
//!
//! The explorer gives no signal that a page turn has finished, and its
//! "next" control has no stable markup. The loop therefore identifies a page
//! by the hash of its top row (the row key): a page turn only counts once the
//! key changes, and a page whose key matches the previous page is stale.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::browser::{ExplorerPage, NextStrategy};
use crate::events::{ScrapeEvent, ScrapeObserver};
use crate::models::{RawRow, StopReason, TransactionRecord, TIMESTAMP_SENTINEL};
use crate::pace::Pacer;

/// Longest string still accepted as a display timestamp.
const MAX_TIMESTAMP_LEN: usize = 40;

/// Tokens this long with no separators are hash fragments, not times.
const HASH_FRAGMENT_LEN: usize = 16;

const TIME_SEPARATORS: [char; 5] = [' ', '-', ':', '/', ','];

fn absolute_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // 2024-05-01 10:00:00, 2024-05-01T10:00Z
            r"\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}(?::\d{2})?(?:\s?(?:UTC|Z))?",
            // 05/01/2024, 10:00:00 AM
            r"\d{1,2}/\d{1,2}/\d{4},?\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s?[AP]M)?",
            // May 1, 2024 10:00 AM
            r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}(?:,?\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s?[AP]M)?)?",
            r"\d{4}-\d{2}-\d{2}",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("timestamp regex is valid"))
        .collect()
    })
}

fn relative_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:\d+|an?|a few)\s*(?:s|secs?|seconds?|m|mins?|minutes?|h|hrs?|hours?|d|days?|w|wks?|weeks?|mos?|months?|y|yrs?|years?)\s+ago|just now)\b",
        )
        .expect("relative time regex is valid")
    })
}

/// A number followed by a unit, like `0.00199 SUI` or `12 objects`.
fn amount_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?\d[\d,]*(?:\.\d+)?\s*[A-Za-z$]+$").expect("amount regex is valid")
    })
}

/// Sanity filter for free-form timestamp candidates.
///
/// Rejects anything long, digit-free, separator-free, amount-shaped, or
/// containing a long unbroken token.
pub fn looks_like_time(candidate: &str) -> bool {
    let c = candidate.trim();
    if c.is_empty() || c.len() > MAX_TIMESTAMP_LEN {
        return false;
    }
    if !c.chars().any(|ch| ch.is_ascii_digit()) {
        return false;
    }
    if !c.contains(TIME_SEPARATORS) {
        return false;
    }
    let has_time_hint = c.contains([':', '/']) || c.to_ascii_lowercase().contains("ago");
    if !has_time_hint && amount_pattern().is_match(c) {
        return false;
    }
    !c.split(TIME_SEPARATORS)
        .any(|token| token.len() >= HASH_FRAGMENT_LEN)
}

/// Timestamp of a row, absolute dates first, then relative ages, then the
/// last cell if it passes [`looks_like_time`].
pub fn extract_timestamp(row: &RawRow) -> Option<String> {
    for re in absolute_patterns() {
        if let Some(m) = re.find(&row.row_text) {
            return Some(m.as_str().to_string());
        }
    }

    if let Some(m) = relative_pattern().find(&row.row_text) {
        return Some(m.as_str().to_string());
    }

    row.cells
        .iter()
        .rev()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && *c != row.link_text.trim())
        .find(|c| looks_like_time(c))
        .map(str::to_string)
}

/// Identity of a row: the link text, or the last path segment of the href.
pub fn row_key(row: &RawRow) -> Option<String> {
    let text = row.link_text.trim();
    if !text.is_empty() {
        return Some(text.to_string());
    }

    let path = row.href.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|seg| !seg.is_empty() && !seg.contains(':'))
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither link text nor href yielded a hash.
    NoHash,
    NoLink,
}

/// Outcome of parsing one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowExtraction {
    Complete(TransactionRecord),
    /// Parsed, but the timestamp is the sentinel.
    Degraded(TransactionRecord),
    Skipped(SkipReason),
}

pub fn extract_row(row: &RawRow) -> RowExtraction {
    if row.href.trim().is_empty() {
        return RowExtraction::Skipped(SkipReason::NoLink);
    }
    let Some(hash) = row_key(row) else {
        return RowExtraction::Skipped(SkipReason::NoHash);
    };

    match extract_timestamp(row) {
        Some(ts) => RowExtraction::Complete(TransactionRecord::new(hash, ts, row.href.trim())),
        None => RowExtraction::Degraded(TransactionRecord::new(
            hash,
            TIMESTAMP_SENTINEL,
            row.href.trim(),
        )),
    }
}

/// Bounds and waits for one pagination run.
#[derive(Debug, Clone)]
pub struct PagerSettings {
    pub max_pages: usize,
    pub tx_path_marker: String,
    pub stale_retries: usize,
    pub advance_checks: usize,
    pub page_turn_settle: Duration,
    pub stale_retry_delay: Duration,
    pub advance_poll: Duration,
}

/// Loop state carried from page to page.
#[derive(Debug, Default)]
pub struct PagerState {
    pub previous_top_key: Option<String>,
    pub records: Vec<TransactionRecord>,
    pub page_index: usize,
    pub advance_attempts: usize,
    pub rows_skipped: usize,
}

/// What the loop produced.
#[derive(Debug, Clone)]
pub struct PagerReport {
    pub records: Vec<TransactionRecord>,
    pub pages_scraped: usize,
    pub advance_attempts: usize,
    pub rows_skipped: usize,
    pub stop_reason: StopReason,
}

enum Advance {
    Advanced(NextStrategy),
    NoControl,
    NotAdvancing,
}

fn top_key(rows: &[RawRow]) -> Option<String> {
    rows.first().and_then(row_key)
}

/// A page is stale only when both it and the previous page have a top key
/// and the keys match.
pub fn is_stale(previous: Option<&str>, rows: &[RawRow]) -> bool {
    match (previous, top_key(rows)) {
        (Some(previous), Some(current)) => previous == current,
        _ => false,
    }
}

pub struct Pager<'a> {
    page: &'a dyn ExplorerPage,
    pacer: &'a dyn Pacer,
    settings: &'a PagerSettings,
}

impl<'a> Pager<'a> {
    pub fn new(page: &'a dyn ExplorerPage, pacer: &'a dyn Pacer, settings: &'a PagerSettings) -> Self {
        Self {
            page,
            pacer,
            settings,
        }
    }

    /// Scrape up to `max_pages` pages. Never fails: every problem ends the
    /// loop with a [`StopReason`] and whatever was collected so far.
    pub async fn run(&self, observer: &mut dyn ScrapeObserver) -> PagerReport {
        let mut state = PagerState::default();
        let stop_reason = self.run_loop(&mut state, observer).await;

        tracing::info!(
            pages = state.page_index,
            records = state.records.len(),
            skipped = state.rows_skipped,
            reason = %stop_reason,
            "Pagination finished"
        );
        observer.on_event(&ScrapeEvent::Stopped {
            reason: &stop_reason,
        });

        PagerReport {
            records: state.records,
            pages_scraped: state.page_index,
            advance_attempts: state.advance_attempts,
            rows_skipped: state.rows_skipped,
            stop_reason,
        }
    }

    async fn run_loop(&self, state: &mut PagerState, observer: &mut dyn ScrapeObserver) -> StopReason {
        let max_pages = self.settings.max_pages;

        loop {
            if state.page_index >= max_pages {
                return StopReason::MaxPages;
            }
            let page_no = state.page_index + 1;
            observer.on_event(&ScrapeEvent::PageStarted {
                page: page_no,
                max_pages,
            });

            if let Err(e) = self.page.scroll_to_bottom().await {
                tracing::debug!(page = page_no, error = %e, "Scroll failed");
            }

            let mut rows = match self.collect().await {
                Ok(rows) => rows,
                Err(reason) => return reason,
            };

            if rows.is_empty() {
                tracing::info!(page = page_no, "No rows on page");
                return StopReason::NoRows;
            }

            if state.page_index > 0 {
                let mut retries = 0;
                while is_stale(state.previous_top_key.as_deref(), &rows) {
                    if retries >= self.settings.stale_retries {
                        tracing::warn!(page = page_no, retries, "Page still stale, stopping");
                        return StopReason::StaleAfterAdvance;
                    }
                    retries += 1;
                    tracing::debug!(page = page_no, retries, "Top row unchanged, re-collecting");
                    self.pacer.pause(self.settings.stale_retry_delay).await;
                    rows = match self.collect().await {
                        Ok(rows) => rows,
                        Err(reason) => return reason,
                    };
                    if rows.is_empty() {
                        return StopReason::NoRows;
                    }
                }
            }

            let (mut added, mut degraded, mut skipped) = (0, 0, 0);
            for row in &rows {
                match extract_row(row) {
                    RowExtraction::Complete(record) => {
                        added += 1;
                        state.records.push(record);
                    }
                    RowExtraction::Degraded(record) => {
                        added += 1;
                        degraded += 1;
                        state.records.push(record);
                    }
                    RowExtraction::Skipped(reason) => {
                        skipped += 1;
                        tracing::debug!(page = page_no, ?reason, "Row skipped");
                    }
                }
            }
            state.rows_skipped += skipped;
            state.previous_top_key = top_key(&rows);
            state.page_index += 1;

            tracing::info!(page = page_no, added, degraded, skipped, "Page scraped");
            observer.on_event(&ScrapeEvent::PageScraped {
                page: page_no,
                added,
                degraded,
                skipped,
                records: &state.records,
            });

            if state.page_index >= max_pages {
                return StopReason::MaxPages;
            }

            state.advance_attempts += 1;
            match self.advance(state.previous_top_key.as_deref()).await {
                Ok(Advance::Advanced(strategy)) => {
                    tracing::info!(page = page_no, strategy = strategy.name(), "Advanced to next page");
                    observer.on_event(&ScrapeEvent::Advanced {
                        page: page_no + 1,
                        strategy,
                    });
                }
                Ok(Advance::NoControl) => return StopReason::NoNextControl,
                Ok(Advance::NotAdvancing) => return StopReason::NotAdvancing,
                Err(reason) => return reason,
            }
        }
    }

    async fn collect(&self) -> Result<Vec<RawRow>, StopReason> {
        self.page
            .collect_rows(&self.settings.tx_path_marker)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to collect rows");
                StopReason::BrowserError {
                    message: e.to_string(),
                }
            })
    }

    /// Try each "next" strategy in order; the first whose click changes the
    /// top row wins.
    async fn advance(&self, current: Option<&str>) -> Result<Advance, StopReason> {
        let checks = self.settings.advance_checks.max(1);
        let mut clicked_any = false;

        for strategy in NextStrategy::ALL {
            match self.page.click_next(strategy).await {
                Ok(true) => clicked_any = true,
                Ok(false) => {
                    tracing::debug!(strategy = strategy.name(), "No next control");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(strategy = strategy.name(), error = %e, "Next click errored");
                    continue;
                }
            }

            self.pacer.pause(self.settings.page_turn_settle).await;
            for check in 1..=checks {
                let rows = self.collect().await?;
                match top_key(&rows) {
                    Some(key) if Some(key.as_str()) != current => {
                        return Ok(Advance::Advanced(strategy));
                    }
                    _ => {
                        tracing::debug!(strategy = strategy.name(), check, "Top row unchanged");
                        if check < checks {
                            self.pacer.pause(self.settings.advance_poll).await;
                        }
                    }
                }
            }
        }

        Ok(if clicked_any {
            Advance::NotAdvancing
        } else {
            Advance::NoControl
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(link_text: &str, href: &str, row_text: &str, cells: &[&str]) -> RawRow {
        RawRow {
            link_text: link_text.to_string(),
            href: href.to_string(),
            row_text: row_text.to_string(),
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn absolute_date_wins_over_relative() {
        let row = raw(
            "H1",
            "https://suiscan.xyz/mainnet/tx/H1",
            "H1 Transfer 3 mins ago 2024-05-01 10:00:00 0.002 SUI",
            &[],
        );
        assert_eq!(extract_timestamp(&row).as_deref(), Some("2024-05-01 10:00:00"));
    }

    #[test]
    fn other_absolute_formats() {
        let row = raw("H", "/tx/H", "H 05/01/2024, 10:00:00 AM", &[]);
        assert_eq!(extract_timestamp(&row).as_deref(), Some("05/01/2024, 10:00:00 AM"));

        let row = raw("H", "/tx/H", "H May 1, 2024 10:00 AM", &[]);
        assert_eq!(extract_timestamp(&row).as_deref(), Some("May 1, 2024 10:00 AM"));
    }

    #[test]
    fn relative_age() {
        let row = raw("H", "/tx/H", "H\tProgrammable\t12 mins ago", &[]);
        assert_eq!(extract_timestamp(&row).as_deref(), Some("12 mins ago"));

        let row = raw("H", "/tx/H", "H 2h ago", &[]);
        assert_eq!(extract_timestamp(&row).as_deref(), Some("2h ago"));

        let row = raw("H", "/tx/H", "H a day ago", &[]);
        assert_eq!(extract_timestamp(&row).as_deref(), Some("a day ago"));
    }

    #[test]
    fn relative_inside_hash_is_ignored() {
        let row = raw("H", "/tx/H", "Hab12d ago", &[]);
        assert_eq!(extract_timestamp(&row), None);
    }

    #[test]
    fn last_cell_fallback_respects_sanity_filter() {
        let row = raw(
            "9xQe...7bTz",
            "/tx/9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
            "9xQe...7bTz 9xQeWvG816bUx9EPjHmaT23yv",
            &["9xQe...7bTz", "Transfer", "9xQeWvG816bUx9EPjHmaT23yv"],
        );
        assert_eq!(extract_timestamp(&row), None);

        let row = raw("H", "/tx/H", "H Transfer 1 May 10:00", &["H", "Transfer", "1 May 10:00"]);
        assert_eq!(extract_timestamp(&row).as_deref(), Some("1 May 10:00"));
    }

    #[test]
    fn sanity_filter() {
        assert!(looks_like_time("10:00"));
        assert!(looks_like_time("1 May 10:00"));
        assert!(!looks_like_time("Transfer"));
        assert!(!looks_like_time("0x5d3f9a8b7c6d5e4f"));
        assert!(!looks_like_time("0x5d3f9a8b7c6d5e4f3a2b 10:00"));
        assert!(!looks_like_time(&"1 ".repeat(30)));
    }

    #[test]
    fn short_relative_units_beat_amount_cell() {
        for when in ["5m ago", "30s ago", "a few seconds ago", "2h ago"] {
            let row = raw(
                "H1",
                "https://suiscan.xyz/mainnet/tx/H1",
                &format!("H1\tTransferSui\t{when}\t0.00199 SUI"),
                &["H1", "TransferSui", when, "0.00199 SUI"],
            );
            assert_eq!(extract_timestamp(&row).as_deref(), Some(when));
        }
    }

    #[test]
    fn amount_cell_is_never_a_timestamp() {
        let row = raw(
            "H1",
            "https://suiscan.xyz/mainnet/tx/H1",
            "H1\tTransferSui\t0.00199 SUI",
            &["H1", "TransferSui", "0.00199 SUI"],
        );
        assert_eq!(extract_timestamp(&row), None);
        assert!(!looks_like_time("0.00199 SUI"));
        assert!(!looks_like_time("1,250 objects"));
        assert!(looks_like_time("05/01 10:00"));
    }

    #[test]
    fn stale_needs_two_matching_keys() {
        let keyed = vec![raw("H1", "https://x/tx/H1", "", &[])];
        let keyless = vec![raw("", "", "", &[])];

        assert!(is_stale(Some("H1"), &keyed));
        assert!(!is_stale(Some("H2"), &keyed));
        assert!(!is_stale(None, &keyless));
        assert!(!is_stale(None, &keyed));
        assert!(!is_stale(Some("H1"), &keyless));
        assert!(!is_stale(Some("H1"), &[]));
    }

    #[test]
    fn row_key_falls_back_to_href() {
        let row = raw("", "https://suiscan.xyz/mainnet/tx/Abc123?tab=events", "", &[]);
        assert_eq!(row_key(&row).as_deref(), Some("Abc123"));

        let row = raw("  ", "https://suiscan.xyz/mainnet/tx/Abc123/", "", &[]);
        assert_eq!(row_key(&row).as_deref(), Some("Abc123"));

        let row = raw("", "https:", "", &[]);
        assert_eq!(row_key(&row), None);
    }

    #[test]
    fn extract_row_outcomes() {
        let complete = raw("H1", "https://x/tx/H1", "H1 2024-05-01 10:00:00", &[]);
        assert_eq!(
            extract_row(&complete),
            RowExtraction::Complete(TransactionRecord::new(
                "H1",
                "2024-05-01 10:00:00",
                "https://x/tx/H1"
            ))
        );

        let degraded = raw("H2", "https://x/tx/H2", "H2 Transfer", &["H2", "Transfer"]);
        assert_eq!(
            extract_row(&degraded),
            RowExtraction::Degraded(TransactionRecord::new("H2", "N/A", "https://x/tx/H2"))
        );

        let no_link = raw("H3", "", "H3 2h ago", &[]);
        assert_eq!(extract_row(&no_link), RowExtraction::Skipped(SkipReason::NoLink));

        let no_hash = raw("", "https:", "2h ago", &[]);
        assert_eq!(extract_row(&no_hash), RowExtraction::Skipped(SkipReason::NoHash));
    }
}
