//! Switching the account page to its activity view.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::browser::{ExplorerPage, TabStrategy};
use crate::error::ScrapeError;
use crate::pace::Pacer;

/// Progress of the view switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Unknown,
    /// A click attempt was made (or none was possible) and the page is being
    /// checked for activity markers.
    Verifying {
        attempt: usize,
        clicked: Option<TabStrategy>,
    },
    Activated {
        attempts: usize,
    },
    Failed {
        attempts: usize,
    },
}

/// Settings for one view switch.
#[derive(Debug, Clone)]
pub struct ActivitySwitch {
    pub label: String,
    pub markers: Vec<String>,
    /// Already clamped to 1..=3 by the caller.
    pub attempts: usize,
    pub settle: Duration,
    pub all_filter_label: Option<String>,
    pub screenshot_dir: Option<PathBuf>,
}

/// True when any marker unique to the activity view is in `text`.
pub fn shows_activity(text: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| text.contains(m.as_str()))
}

impl ActivitySwitch {
    /// Click the activity control until the view is verified.
    ///
    /// Returns the final state, which is always `Activated` on `Ok`.
    /// Exhausting every attempt is fatal.
    pub async fn run(&self, page: &dyn ExplorerPage, pacer: &dyn Pacer) -> Result<ViewState> {
        let mut state = ViewState::Unknown;

        for attempt in 1..=self.attempts {
            let clicked = self.click_once(page).await;
            state = ViewState::Verifying { attempt, clicked };
            tracing::debug!(?state, "Activity tab attempt");

            pacer.pause(self.settle).await;

            match page.body_text().await {
                Ok(text) if shows_activity(&text, &self.markers) => {
                    state = ViewState::Activated { attempts: attempt };
                    tracing::info!(
                        attempt,
                        strategy = clicked.map(|s| s.name()).unwrap_or("none"),
                        "Activity view active"
                    );
                    break;
                }
                Ok(_) => tracing::warn!(attempt, "Activity markers not visible yet"),
                Err(e) => tracing::warn!(attempt, error = %e, "Could not read page while verifying"),
            }
        }

        let ViewState::Activated { .. } = state else {
            let attempts = self.attempts;
            self.capture_failure(page).await;
            tracing::error!(attempts, ?state, "Activity view never verified");
            return Err(ScrapeError::ActivityViewUnavailable { attempts }.into());
        };

        self.select_all_filter(page, pacer).await;
        Ok(state)
    }

    async fn click_once(&self, page: &dyn ExplorerPage) -> Option<TabStrategy> {
        for strategy in TabStrategy::ALL {
            match page.click_tab(strategy, &self.label).await {
                Ok(true) => return Some(strategy),
                Ok(false) => {}
                Err(e) => tracing::debug!(strategy = strategy.name(), error = %e, "Tab click errored"),
            }
        }
        None
    }

    async fn select_all_filter(&self, page: &dyn ExplorerPage, pacer: &dyn Pacer) {
        let Some(label) = &self.all_filter_label else {
            return;
        };
        match page.click_tab(TabStrategy::Button, label).await {
            Ok(true) => {
                tracing::debug!(label = %label, "Filter selected");
                pacer.pause(self.settle / 2).await;
            }
            // Usually the default filter already.
            Ok(false) => {}
            Err(e) => tracing::debug!(error = %e, "Filter click errored"),
        }
    }

    async fn capture_failure(&self, page: &dyn ExplorerPage) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };
        let path = dir.join(format!(
            "activity-failure-{}.png",
            chrono::Utc::now().format("%Y%m%dT%H%M%S")
        ));
        match page.screenshot(&path).await {
            Ok(()) => tracing::info!(path = %path.display(), "Saved failure screenshot"),
            Err(e) => tracing::warn!(error = %e, "Failed to save failure screenshot"),
        }
    }
}
