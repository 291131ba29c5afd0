pub mod config;
pub mod dataset;
pub mod fetcher;
pub mod parser;
pub mod scraper;
pub mod types;
pub mod utils;

pub use config::{CrawlConfig, FetchConfig};
pub use scraper::{RunReport, ScraperError, WebScraper};
