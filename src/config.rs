use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};

/// Hard ceiling on pages per run, matching the operator form this replaces.
pub const MAX_PAGES_LIMIT: usize = 50;

/// The view switcher never retries more than this many times.
pub const MAX_ACTIVITY_ATTEMPTS: usize = 3;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Where the explorer lives and what its pages look like.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Network root, without trailing slash. Account pages live under
    /// `{base_url}/account/{address}`.
    pub base_url: String,

    /// Substring of an anchor's href that marks it as a transaction link.
    pub tx_path_marker: String,

    /// Labels searched for the balance figure, most specific first.
    pub balance_labels: Vec<String>,

    /// Text of the control that switches to the activity view.
    pub activity_label: String,

    /// Any of these appearing in the page proves the activity view is showing.
    pub activity_markers: Vec<String>,

    /// Filter button clicked (best-effort) once the activity view is active.
    pub all_filter_label: Option<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://suiscan.xyz/mainnet".to_string(),
            tx_path_marker: "/tx/".to_string(),
            balance_labels: vec!["SUI Balance".to_string(), "Balance".to_string()],
            activity_label: "Activity".to_string(),
            activity_markers: vec!["Gas Fee".to_string(), "Digest".to_string()],
            all_filter_label: Some("All".to_string()),
        }
    }
}

impl ExplorerConfig {
    /// Account page URL for a wallet address.
    ///
    /// The address is not validated, only percent-encoded so that free text
    /// cannot escape the path segment.
    pub fn account_url(&self, address: &str) -> String {
        format!(
            "{}/account/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(address.trim())
        )
    }
}

/// Browser launch options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,

    /// Pass `--no-sandbox`. Needed in most containers.
    pub no_sandbox: bool,

    pub user_agent: String,

    /// Explicit Chrome/Chromium binary. Discovered from PATH when unset.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            no_sandbox: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_executable: None,
        }
    }
}

fn default_page_settle() -> Duration {
    Duration::from_secs(5)
}

fn default_tab_settle() -> Duration {
    Duration::from_secs(2)
}

fn default_page_turn_settle() -> Duration {
    Duration::from_secs(3)
}

fn default_stale_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_advance_poll() -> Duration {
    Duration::from_secs(1)
}

/// Blind waits. The explorer gives no reliable "done rendering" signal, so
/// every phase waits a fixed amount of time instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// After navigating to the account page, before reading the balance.
    #[serde(
        default = "default_page_settle",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub page_settle: Duration,

    /// After each attempt to click the activity tab (also between attempts).
    #[serde(
        default = "default_tab_settle",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub tab_settle: Duration,

    /// After clicking a "next" control, before checking the top row.
    #[serde(
        default = "default_page_turn_settle",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub page_turn_settle: Duration,

    /// Between re-collections of a page whose top row did not change.
    #[serde(
        default = "default_stale_retry_delay",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub stale_retry_delay: Duration,

    /// Between polls of the top row after a page turn.
    #[serde(
        default = "default_advance_poll",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub advance_poll: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_settle: default_page_settle(),
            tab_settle: default_tab_settle(),
            page_turn_settle: default_page_turn_settle(),
            stale_retry_delay: default_stale_retry_delay(),
            advance_poll: default_advance_poll(),
        }
    }
}

impl TimingConfig {
    /// All waits set to zero. Used by tests and dry runs against local pages.
    pub fn immediate() -> Self {
        Self {
            page_settle: Duration::ZERO,
            tab_settle: Duration::ZERO,
            page_turn_settle: Duration::ZERO,
            stale_retry_delay: Duration::ZERO,
            advance_poll: Duration::ZERO,
        }
    }
}

/// Retry budgets and page bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Default page budget when the caller does not supply one.
    pub max_pages: usize,

    /// Activity tab attempts, clamped to 1..=3.
    pub activity_attempts: usize,

    /// Re-collections of a stale page before giving up on pagination.
    pub stale_retries: usize,

    /// Top-row polls after each "next" click.
    pub advance_checks: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            activity_attempts: MAX_ACTIVITY_ATTEMPTS,
            stale_retries: 2,
            advance_checks: 3,
        }
    }
}

impl LimitsConfig {
    pub fn effective_activity_attempts(&self) -> usize {
        self.activity_attempts.clamp(1, MAX_ACTIVITY_ATTEMPTS)
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Add a "Wallet Balance" column to every exported row.
    pub include_balance: bool,

    /// Directory for output files when no explicit path is given.
    /// Relative paths resolve against the config file's directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            include_balance: true,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// When set, a screenshot is saved here before a fatal view-switch failure.
    pub screenshot_dir: Option<PathBuf>,
}

/// Application configuration, as read from `suiscrape.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub explorer: ExplorerConfig,
    pub browser: BrowserSettings,
    pub timing: TimingConfig,
    pub limits: LimitsConfig,
    pub export: ExportConfig,
    pub debug: DebugConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve relative output/screenshot directories against `config_dir`.
    fn resolve_paths(mut self, config_dir: &Path) -> Self {
        let resolve = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                config_dir.join(p)
            }
        };
        self.export.output_dir = Some(
            self.export
                .output_dir
                .take()
                .map(resolve)
                .unwrap_or_else(|| config_dir.to_path_buf()),
        );
        self.debug.screenshot_dir = self.debug.screenshot_dir.take().map(resolve);
        self
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The file this was loaded from (it may not exist).
    pub config_path: PathBuf,

    /// Directory output files land in when no explicit path is given.
    pub output_dir: PathBuf,

    pub config: Config,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./suiscrape.toml` if it exists in current directory
/// 2. `~/.config/suiscrape/suiscrape.toml`
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("suiscrape.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("suiscrape").join("suiscrape.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?.resolve_paths(config_dir);
        Ok(Self::from_parts(config_path.clone(), config))
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// Without a file, output goes to the current directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        let config = Config::default().resolve_paths(&cwd);
        Ok(Self::from_parts(config_path.to_path_buf(), config))
    }

    fn from_parts(config_path: PathBuf, config: Config) -> Self {
        let output_dir = config
            .export
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_path,
            output_dir,
            config,
        }
    }
}
