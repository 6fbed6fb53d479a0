pub mod activity;
pub mod balance;
pub mod browser;
pub mod config;
pub mod duration;
pub mod error;
pub mod events;
pub mod export;
pub mod models;
pub mod pace;
pub mod pager;
pub mod scraper;

pub use error::ScrapeError;
pub use scraper::{ScrapeRequest, Scraper};
