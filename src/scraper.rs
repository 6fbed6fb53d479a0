//! One scrape run, start to finish.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::activity::ActivitySwitch;
use crate::balance::extract_balance;
use crate::browser::ExplorerPage;
use crate::config::{Config, MAX_PAGES_LIMIT};
use crate::error::ScrapeError;
use crate::events::{ScrapeEvent, ScrapeObserver};
use crate::models::ScrapeReport;
use crate::pace::{Pacer, TokioPacer};
use crate::pager::{Pager, PagerSettings};

/// What to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub address: String,
    pub max_pages: usize,
}

impl ScrapeRequest {
    /// The address is only checked for emptiness; anything else is passed
    /// through to the explorer as-is.
    pub fn new(address: impl Into<String>, max_pages: usize) -> Result<Self, ScrapeError> {
        let address = address.into().trim().to_string();
        if address.is_empty() {
            return Err(ScrapeError::EmptyAddress);
        }
        if max_pages == 0 || max_pages > MAX_PAGES_LIMIT {
            return Err(ScrapeError::MaxPagesOutOfRange {
                requested: max_pages,
                limit: MAX_PAGES_LIMIT,
            });
        }
        Ok(Self { address, max_pages })
    }
}

pub struct Scraper {
    config: Config,
    pacer: Arc<dyn Pacer>,
}

impl Scraper {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pacer: Arc::new(TokioPacer),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    fn pager_settings(&self, request: &ScrapeRequest) -> PagerSettings {
        let timing = &self.config.timing;
        let limits = &self.config.limits;
        PagerSettings {
            max_pages: request.max_pages,
            tx_path_marker: self.config.explorer.tx_path_marker.clone(),
            stale_retries: limits.stale_retries,
            advance_checks: limits.advance_checks,
            page_turn_settle: timing.page_turn_settle,
            stale_retry_delay: timing.stale_retry_delay,
            advance_poll: timing.advance_poll,
        }
    }

    fn activity_switch(&self) -> ActivitySwitch {
        let explorer = &self.config.explorer;
        ActivitySwitch {
            label: explorer.activity_label.clone(),
            markers: explorer.activity_markers.clone(),
            attempts: self.config.limits.effective_activity_attempts(),
            settle: self.config.timing.tab_settle,
            all_filter_label: explorer.all_filter_label.clone(),
            screenshot_dir: self.config.debug.screenshot_dir.clone(),
        }
    }

    /// Run the whole flow against an already-open page.
    ///
    /// Only navigation failure and an unverifiable activity view are errors.
    pub async fn scrape_page(
        &self,
        page: &dyn ExplorerPage,
        request: &ScrapeRequest,
        observer: &mut dyn ScrapeObserver,
    ) -> Result<ScrapeReport> {
        let started_at = Utc::now();
        let pacer = self.pacer.as_ref();
        let url = self.config.explorer.account_url(&request.address);

        let browser = &self.config.browser;
        if let Err(e) = page.resize(browser.window_width, browser.window_height).await {
            tracing::warn!(error = %e, "Viewport resize failed; continuing with window size");
        }

        tracing::info!(url = %url, max_pages = request.max_pages, "Opening account page");
        observer.on_event(&ScrapeEvent::Navigating { url: &url });
        page.navigate(&url).await?;
        pacer.pause(self.config.timing.page_settle).await;

        let balance = extract_balance(page, &self.config.explorer.balance_labels).await;
        observer.on_event(&ScrapeEvent::BalanceRead { balance: &balance });

        observer.on_event(&ScrapeEvent::SwitchingView);
        self.activity_switch().run(page, pacer).await?;
        observer.on_event(&ScrapeEvent::ActivityReady);

        let settings = self.pager_settings(request);
        let pages = Pager::new(page, pacer, &settings).run(observer).await;

        Ok(ScrapeReport {
            address: request.address.clone(),
            url,
            balance,
            records: pages.records,
            pages_scraped: pages.pages_scraped,
            advance_attempts: pages.advance_attempts,
            rows_skipped: pages.rows_skipped,
            stop_reason: pages.stop_reason,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Acquire a Chromium session, scrape, and release the session on every
    /// exit path.
    #[cfg(feature = "chromium")]
    pub async fn run(
        &self,
        request: &ScrapeRequest,
        observer: &mut dyn ScrapeObserver,
    ) -> Result<ScrapeReport> {
        use crate::browser::chromium::ChromiumSession;

        let session = ChromiumSession::acquire(&self.config.browser).await?;
        let result = self.scrape_page(session.page(), request, observer).await;
        session.release().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_trims_address() {
        let request = ScrapeRequest::new("  0xabc  ", 5).unwrap();
        assert_eq!(request.address, "0xabc");
        assert_eq!(request.max_pages, 5);
    }

    #[test]
    fn request_rejects_empty_address() {
        assert!(matches!(
            ScrapeRequest::new("   ", 5),
            Err(ScrapeError::EmptyAddress)
        ));
    }

    #[test]
    fn request_bounds_max_pages() {
        assert!(matches!(
            ScrapeRequest::new("0xabc", 0),
            Err(ScrapeError::MaxPagesOutOfRange { requested: 0, limit: 50 })
        ));
        assert!(ScrapeRequest::new("0xabc", 51).is_err());
        assert!(ScrapeRequest::new("0xabc", 50).is_ok());
        assert!(ScrapeRequest::new("0xabc", 1).is_ok());
    }
}
