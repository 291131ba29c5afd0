use std::path::PathBuf;
use std::time::Duration;

use crate::types::Platform;

pub const BASE_URL: &str = "https://www.metacritic.com";
pub const DEFAULT_OUTPUT_PATH: &str = "metacritic_games_data.csv";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Start page must be greater than 0")]
    ZeroStartPage,
    #[error("Max pages must be greater than 0")]
    ZeroMaxPages,
    #[error("{name} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { name: &'static str, value: f64 },
    #[error("Release year range is inverted ({min} > {max})")]
    InvertedYearRange { min: u16, max: u16 },
    #[error("Output path cannot be empty")]
    EmptyOutputPath,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub request_delay: Duration,
    pub jitter: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    /// No waiting between requests or retries. Meant for tests and local mirrors.
    pub fn immediate() -> Self {
        Self {
            request_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_page: u32,
    /// Per-platform page budget. `None` crawls until the listing is exhausted.
    pub max_pages: Option<u32>,
    pub output_path: PathBuf,
    pub platforms: Vec<Platform>,
    pub release_year_min: u16,
    pub release_year_max: u16,
    pub base_url: String,
    pub fetch: FetchConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            max_pages: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            platforms: Vec::new(),
            release_year_min: 1958,
            release_year_max: 2024,
            base_url: BASE_URL.to_string(),
            fetch: FetchConfig::default(),
        }
    }
}

impl CrawlConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.start_page == 0 {
            return Err(ConfigError::ZeroStartPage);
        }
        if self.max_pages.is_some_and(|m| m == 0) {
            return Err(ConfigError::ZeroMaxPages);
        }
        if self.release_year_min > self.release_year_max {
            return Err(ConfigError::InvertedYearRange {
                min: self.release_year_min,
                max: self.release_year_max,
            });
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyOutputPath);
        }
        Ok(self)
    }

    pub fn listing_url(&self, platform: Option<Platform>, page: u32) -> String {
        let base = self.base_url.trim_end_matches('/');
        match platform {
            Some(p) => format!(
                "{}/browse/game/{}/all/all-time/metascore/?releaseYearMin={}&releaseYearMax={}&platform={}&page={}",
                base,
                p.slug(),
                self.release_year_min,
                self.release_year_max,
                p.slug(),
                page
            ),
            None => format!(
                "{}/browse/game/?releaseYearMin={}&releaseYearMax={}&page={}",
                base, self.release_year_min, self.release_year_max, page
            ),
        }
    }

    pub fn absolute_url(&self, url_or_path: &str) -> String {
        if url_or_path.starts_with("http") {
            url_or_path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url_or_path.trim_start_matches('/')
            )
        }
    }

    /// The platforms to crawl in order. An empty filter means one unfiltered crawl.
    pub fn crawl_targets(&self) -> Vec<Option<Platform>> {
        if self.platforms.is_empty() {
            vec![None]
        } else {
            self.platforms.iter().copied().map(Some).collect()
        }
    }

    pub fn failed_items_path(&self) -> PathBuf {
        let mut name = self.output_path.as_os_str().to_owned();
        name.push(".failed");
        PathBuf::from(name)
    }
}

pub fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidDuration { name, value });
    }
    Ok(Duration::from_secs_f64(value))
}
