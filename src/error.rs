use std::path::PathBuf;

/// Conditions that abort a run.
///
/// Everything else (missing balance, bad rows, pagination trouble) degrades
/// to a sentinel or an early stop instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Please enter a wallet address")]
    EmptyAddress,

    #[error("max pages must be between 1 and {limit}, got {requested}")]
    MaxPagesOutOfRange { requested: usize, limit: usize },

    #[error("Chrome/Chromium not found. Install Chrome or Chromium, or set browser.chrome_executable")]
    BrowserUnavailable,

    #[error("Chrome executable does not exist: {}", .0.display())]
    BrowserMissingAt(PathBuf),

    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Failed to open {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Could not switch to the activity view after {attempts} attempt(s)")]
    ActivityViewUnavailable { attempts: usize },
}
