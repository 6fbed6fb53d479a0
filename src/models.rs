//! Records produced by a scrape run.
//!
//! Everything here is transient: built during one run, exported, dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for a timestamp that could not be extracted from a row.
pub const TIMESTAMP_SENTINEL: &str = "N/A";

/// Placeholder for a balance that could not be located on the page.
pub const BALANCE_SENTINEL: &str = "Not Found";

/// One scraped transaction row.
///
/// Ordered by scrape order, not by time, and never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    /// Display text as shown by the explorer (absolute or relative), or
    /// [`TIMESTAMP_SENTINEL`].
    pub timestamp: String,
    pub link: String,
}

impl TransactionRecord {
    pub fn new(
        hash: impl Into<String>,
        timestamp: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            timestamp: timestamp.into(),
            link: link.into(),
        }
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamp != TIMESTAMP_SENTINEL
    }
}

/// Which heuristic produced a balance reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    LayoutAdjacent,
    NextLine,
    DecimalPattern,
}

/// The balance figure as displayed, captured once per run.
///
/// Never validated as numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReading {
    pub value: String,
    /// `None` when the value is the sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<BalanceStrategy>,
}

impl BalanceReading {
    pub fn found(value: impl Into<String>, strategy: BalanceStrategy) -> Self {
        Self {
            value: value.into(),
            strategy: Some(strategy),
        }
    }

    pub fn not_found() -> Self {
        Self {
            value: BALANCE_SENTINEL.to_string(),
            strategy: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.strategy.is_some()
    }
}

impl std::fmt::Display for BalanceReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// A candidate row as the browser reports it, before any parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// Rendered text of the transaction link.
    pub link_text: String,
    /// Resolved href of the transaction link.
    pub href: String,
    /// Full rendered text of the enclosing row.
    pub row_text: String,
    /// Rendered text of each cell of the enclosing row, in order.
    #[serde(default)]
    pub cells: Vec<String>,
}

/// Why the pagination loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The page budget was used up.
    MaxPages,
    /// A page showed no transaction rows.
    NoRows,
    /// The top row never changed after a page turn, even after re-collecting.
    StaleAfterAdvance,
    /// No strategy found a "next" control.
    NoNextControl,
    /// "Next" controls were clicked but the top row never changed.
    NotAdvancing,
    /// The browser failed mid-loop; results so far are kept.
    BrowserError { message: String },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::MaxPages => write!(f, "page limit reached"),
            StopReason::NoRows => write!(f, "no more rows"),
            StopReason::StaleAfterAdvance => write!(f, "page did not change after advancing"),
            StopReason::NoNextControl => write!(f, "no next-page control found"),
            StopReason::NotAdvancing => write!(f, "next-page control did not advance"),
            StopReason::BrowserError { message } => write!(f, "browser error: {message}"),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub address: String,
    pub url: String,
    pub balance: BalanceReading,
    pub records: Vec<TransactionRecord>,
    pub pages_scraped: usize,
    pub advance_attempts: usize,
    pub rows_skipped: usize,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
