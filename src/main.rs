use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use suiscrape::config::{default_config_path, ResolvedConfig};
use suiscrape::events::{ScrapeEvent, ScrapeObserver};
use suiscrape::export::{
    default_file_name, export_report, render_table, ExportFormat, ExportOutcome, EMPTY_NOTICE,
};
use suiscrape::{ScrapeRequest, Scraper};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Rows of the live table shown after each page.
const LIVE_TABLE_ROWS: usize = 10;

#[derive(Parser)]
#[command(name = "suiscrape")]
#[command(about = "Scrape SUI balance and transaction activity from Suiscan")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")"))]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape balance and activity for a wallet address
    Scrape {
        /// Wallet address
        address: String,

        /// Maximum number of activity pages to scrape (1-50)
        #[arg(short, long)]
        max_pages: Option<usize>,

        /// Output file (defaults to sui_activity_<address prefix>.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv or json
        #[arg(short, long, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Leave the wallet balance column out of CSV output
        #[arg(long)]
        no_balance_column: bool,

        /// Show the browser window
        #[arg(long)]
        headful: bool,

        /// Save a screenshot here if the activity view cannot be opened
        #[arg(long)]
        screenshot_dir: Option<PathBuf>,
    },
    /// Show current configuration
    Config,
}

/// Prints one status line per phase and a live table per page.
struct ConsoleObserver;

impl ScrapeObserver for ConsoleObserver {
    fn on_event(&mut self, event: &ScrapeEvent<'_>) {
        match event {
            ScrapeEvent::Navigating { url } => println!("Navigating to {url}..."),
            ScrapeEvent::BalanceRead { balance } => println!("SUI Balance: {balance}"),
            ScrapeEvent::SwitchingView => println!("Switching to 'Activity' tab..."),
            ScrapeEvent::ActivityReady => println!("Activity view ready."),
            ScrapeEvent::PageStarted { page, max_pages } => {
                println!("Scraping page {page} of {max_pages}...")
            }
            ScrapeEvent::PageScraped {
                page,
                added,
                degraded,
                skipped,
                records,
            } => {
                println!(
                    "Page {page}: {added} rows ({degraded} without timestamp, {skipped} skipped), {} total",
                    records.len()
                );
                print!("{}", render_table(records, Some(LIVE_TABLE_ROWS)));
            }
            ScrapeEvent::Advanced { page, strategy } => {
                println!("Moved to page {page} via {} control.", strategy.name())
            }
            ScrapeEvent::Stopped { reason } => println!("Scraping complete: {reason}."),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off")
    });

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let resolved = ResolvedConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    match cli.command {
        Command::Config => {
            println!("Config file: {}", resolved.config_path.display());
            println!("Output directory: {}\n", resolved.output_dir.display());
            print!(
                "{}",
                toml::to_string_pretty(&resolved.config).context("Failed to render config")?
            );
        }
        Command::Scrape {
            address,
            max_pages,
            output,
            format,
            no_balance_column,
            headful,
            screenshot_dir,
        } => {
            let mut config = resolved.config.clone();
            if headful {
                config.browser.headless = false;
            }
            if let Some(dir) = screenshot_dir {
                config.debug.screenshot_dir = Some(dir);
            }
            let include_balance = config.export.include_balance && !no_balance_column;

            let request =
                ScrapeRequest::new(address, max_pages.unwrap_or(config.limits.max_pages))?;
            println!("Initiating scraper for: {}", request.address);

            let scraper = Scraper::new(config);
            let report = scraper.run(&request, &mut ConsoleObserver).await?;

            match export_report(&report, format, include_balance)? {
                ExportOutcome::Empty => println!("{EMPTY_NOTICE}"),
                ExportOutcome::Data { rows, bytes } => {
                    let path = output.unwrap_or_else(|| {
                        resolved
                            .output_dir
                            .join(default_file_name(&request.address, format))
                    });
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent).with_context(|| {
                            format!("Failed to create output dir: {}", parent.display())
                        })?;
                    }
                    std::fs::write(&path, bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Successfully scraped {rows} transactions.");
                    println!("Saved to {}", path.display());
                }
            }
        }
    }

    Ok(())
}
