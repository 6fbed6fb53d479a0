use crate::browser::NextStrategy;
use crate::models::{BalanceReading, StopReason, TransactionRecord};

/// Progress notifications emitted while a run is underway.
#[derive(Debug, Clone)]
pub enum ScrapeEvent<'a> {
    Navigating { url: &'a str },
    BalanceRead { balance: &'a BalanceReading },
    SwitchingView,
    ActivityReady,
    PageStarted { page: usize, max_pages: usize },
    PageScraped {
        page: usize,
        added: usize,
        degraded: usize,
        skipped: usize,
        /// Everything collected so far, this page included.
        records: &'a [TransactionRecord],
    },
    Advanced { page: usize, strategy: NextStrategy },
    Stopped { reason: &'a StopReason },
}

/// Receives [`ScrapeEvent`]s, typically to print status lines.
pub trait ScrapeObserver: Send {
    fn on_event(&mut self, event: &ScrapeEvent<'_>);
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScrapeObserver for NoopObserver {
    fn on_event(&mut self, _event: &ScrapeEvent<'_>) {}
}
