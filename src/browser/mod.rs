//! Browser capabilities the scraper relies on.
//!
//! The heuristics in [`crate::balance`], [`crate::activity`] and
//! [`crate::pager`] only talk to an [`ExplorerPage`]; they never see CDP.
//! The Chromium implementation lives in [`chromium`].

#[cfg(feature = "chromium")]
pub mod chromium;

use std::path::Path;

use anyhow::Result;

use crate::models::RawRow;

/// Structural guesses for locating a tab-like control by its label, most
/// specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabStrategy {
    /// An element with `role="tab"` containing the label.
    AriaTab,
    /// A `<button>` containing the label.
    Button,
    /// A div/span/link/list item whose own text is exactly the label.
    OwnText,
    /// Any element whose own text contains the label.
    AnyText,
}

impl TabStrategy {
    pub const ALL: [TabStrategy; 4] = [
        TabStrategy::AriaTab,
        TabStrategy::Button,
        TabStrategy::OwnText,
        TabStrategy::AnyText,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TabStrategy::AriaTab => "aria_tab",
            TabStrategy::Button => "button",
            TabStrategy::OwnText => "own_text",
            TabStrategy::AnyText => "any_text",
        }
    }
}

/// Guesses for the "next page" control, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextStrategy {
    /// Last enabled icon button inside a pagination container.
    Icon,
    /// Enabled element whose class, aria-label or title mentions "next".
    Class,
    /// Last enabled clickable element laid out below the transaction rows.
    FooterPosition,
}

impl NextStrategy {
    pub const ALL: [NextStrategy; 3] = [
        NextStrategy::Icon,
        NextStrategy::Class,
        NextStrategy::FooterPosition,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NextStrategy::Icon => "icon",
            NextStrategy::Class => "class",
            NextStrategy::FooterPosition => "footer_position",
        }
    }
}

/// An open explorer page inside an automated browser.
///
/// Implementations report what they see; all interpretation happens above
/// this trait. Methods return `Ok(false)` / `Ok(None)` / an empty vec when a
/// thing is simply absent, and `Err` only when the browser itself failed.
#[async_trait::async_trait]
pub trait ExplorerPage: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Rendered text of the whole document body.
    async fn body_text(&self) -> Result<String>;

    /// Text of the first element laid out next to an element labelled
    /// `label` that contains a digit.
    async fn text_near_label(&self, label: &str) -> Result<Option<String>>;

    /// Find a control labelled `label` using `strategy` and click it.
    async fn click_tab(&self, strategy: TabStrategy, label: &str) -> Result<bool>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Every row holding a link whose href contains `tx_path_marker`, in
    /// document order, one entry per row.
    async fn collect_rows(&self, tx_path_marker: &str) -> Result<Vec<RawRow>>;

    /// Find a "next page" control using `strategy` and click it.
    async fn click_next(&self, strategy: NextStrategy) -> Result<bool>;

    async fn resize(&self, width: u32, height: u32) -> Result<()>;

    async fn screenshot(&self, path: &Path) -> Result<()>;
}
