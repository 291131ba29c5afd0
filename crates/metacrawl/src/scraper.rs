use std::collections::VecDeque;
use std::fmt::Display;

use crate::config::{ConfigError, CrawlConfig};
use crate::dataset::{Dataset, Upsert, WriteError, WriteResult, write_dataset};
use crate::fetcher::{FetchError, Fetcher, HttpTransport, Transport};
use crate::parser::{Detail, ParseError, parse_detail, parse_listing};
use crate::types::{ItemStub, Platform};

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP client setup failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Fetch error: {0}")]
    FetchError(#[from] FetchError),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Dataset write failed: {0}")]
    WriteError(#[from] WriteError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbortInfo {
    pub platform: Option<Platform>,
    pub page: u32,
    pub url: String,
    pub reason: String,
}

impl Display for AbortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.platform {
            Some(p) => write!(f, "{} listing page {}", p, self.page)?,
            None => write!(f, "listing page {}", self.page)?,
        }
        write!(f, " ({}): {}", self.url, self.reason)
    }
}

#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub dataset: Dataset,
    pub pages_crawled: u32,
    pub skipped: usize,
    pub failed_items: Vec<String>,
    pub aborted: Option<AbortInfo>,
}

impl CrawlOutcome {
    fn record(&mut self, detail: Detail) {
        let key = detail.record.key();
        let outcome = if detail.is_partial() {
            self.dataset.upsert_partial(detail.record)
        } else {
            self.dataset.upsert(detail.record)
        };
        match outcome {
            Upsert::Updated => {
                log::debug!("Replaced earlier record for {} [{}]", key.title, key.platform)
            }
            Upsert::Retained => log::warn!(
                "Keeping earlier record for {} [{}] over a partial fetch",
                key.title,
                key.platform
            ),
            Upsert::Inserted | Upsert::Unchanged => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub pages_crawled: u32,
    pub records_scraped: usize,
    pub records_written: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed_items: Vec<String>,
    pub aborted: Option<AbortInfo>,
}

impl RunReport {
    fn new(outcome: CrawlOutcome, written: WriteResult) -> Self {
        Self {
            pages_crawled: outcome.pages_crawled,
            records_scraped: outcome.dataset.len(),
            records_written: written.total,
            inserted: written.inserted,
            updated: written.updated,
            skipped: outcome.skipped,
            failed_items: outcome.failed_items,
            aborted: outcome.aborted,
        }
    }

    pub fn aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nRun summary:")?;
        writeln!(f, "  Listing pages crawled: {}", self.pages_crawled)?;
        writeln!(f, "  Records scraped:       {}", self.records_scraped)?;
        writeln!(
            f,
            "  Records in dataset:    {} ({} new, {} updated)",
            self.records_written, self.inserted, self.updated
        )?;
        writeln!(f, "  Items skipped:         {}", self.skipped)?;
        writeln!(f, "  Items to retry:        {}", self.failed_items.len())?;
        match &self.aborted {
            Some(info) => writeln!(f, "  Aborted at {}", info),
            None => writeln!(f, "  Completed"),
        }
    }
}

#[derive(Debug)]
enum CrawlState {
    Fetching(u32),
    ParsingListing {
        page: u32,
        url: String,
        html: String,
    },
    FetchingDetail {
        page: u32,
        stubs: VecDeque<ItemStub>,
        has_next_page: bool,
    },
    Done,
    Aborted(AbortInfo),
}

#[derive(Debug)]
struct PageCursor {
    next: Option<u32>,
    fetched: u32,
    max_pages: Option<u32>,
}

impl PageCursor {
    fn new(start: u32, max_pages: Option<u32>) -> Self {
        Self {
            next: Some(start),
            fetched: 0,
            max_pages,
        }
    }

    fn advance(&mut self) -> Option<u32> {
        if self.max_pages.is_some_and(|max| self.fetched >= max) {
            return None;
        }
        let page = self.next?;
        self.next = page.checked_add(1);
        self.fetched += 1;
        Some(page)
    }
}

#[derive(Debug)]
pub struct WebScraper<T = HttpTransport> {
    fetcher: Fetcher<T>,
    config: CrawlConfig,
}

impl WebScraper<HttpTransport> {
    pub fn new(config: CrawlConfig) -> Result<Self, ScraperError> {
        let config = config.validate()?;
        let fetcher = Fetcher::new(config.fetch.clone())?;
        Ok(Self { fetcher, config })
    }
}

impl<T: Transport> WebScraper<T> {
    pub fn with_transport(config: CrawlConfig, transport: T) -> Result<Self, ScraperError> {
        let config = config.validate()?;
        let fetcher = Fetcher::with_transport(transport, config.fetch.clone());
        Ok(Self { fetcher, config })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub async fn fetch_game_detail(&mut self, stub: &ItemStub) -> Result<Detail, ScraperError> {
        let url = self.config.absolute_url(&stub.url);
        log::info!("Fetching game detail: {}", url);
        let html = self.fetcher.fetch(&url).await?;
        let stub = ItemStub {
            url,
            ..stub.clone()
        };
        Ok(parse_detail(&html, &stub)?)
    }

    /// Stops at the first aborted platform crawl; records gathered so far are kept.
    pub async fn crawl(&mut self) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();
        for platform in self.config.crawl_targets() {
            if let Some(info) = self.crawl_platform(platform, &mut outcome).await {
                log::error!("Crawl aborted at {}", info);
                outcome.aborted = Some(info);
                break;
            }
        }
        outcome
    }

    /// Crawls and persists the result. The dataset is written even when the
    /// crawl aborted; only a write failure is an error.
    pub async fn run(&mut self) -> Result<RunReport, ScraperError> {
        let outcome = self.crawl().await;
        let written = write_dataset(&self.config.output_path, &outcome.dataset)?;
        Ok(RunReport::new(outcome, written))
    }

    pub async fn retry_items(&mut self, urls: &[String]) -> Result<RunReport, ScraperError> {
        let mut outcome = CrawlOutcome::default();
        log::info!("Retrying {} item(s)...", urls.len());
        for url in urls {
            self.scrape_item(ItemStub::from_url(url.as_str()), &mut outcome)
                .await;
        }
        let written = write_dataset(&self.config.output_path, &outcome.dataset)?;
        Ok(RunReport::new(outcome, written))
    }

    async fn crawl_platform(
        &mut self,
        platform: Option<Platform>,
        outcome: &mut CrawlOutcome,
    ) -> Option<AbortInfo> {
        let mut cursor = PageCursor::new(self.config.start_page, self.config.max_pages);
        let mut state = match cursor.advance() {
            Some(page) => CrawlState::Fetching(page),
            None => CrawlState::Done,
        };

        loop {
            state = match state {
                CrawlState::Fetching(page) => {
                    let url = self.config.listing_url(platform, page);
                    log::info!("Fetching listing page {}...", page);
                    match self.fetcher.fetch(&url).await {
                        Ok(html) => CrawlState::ParsingListing { page, url, html },
                        Err(e) => CrawlState::Aborted(AbortInfo {
                            platform,
                            page,
                            url,
                            reason: e.to_string(),
                        }),
                    }
                }
                CrawlState::ParsingListing { page, url, html } => match parse_listing(&html) {
                    Ok(listing) => {
                        outcome.pages_crawled += 1;
                        if listing.stubs.is_empty() {
                            log::info!("No items on page {}, listing exhausted", page);
                            CrawlState::Done
                        } else {
                            log::info!("Found {} item(s) on page {}", listing.stubs.len(), page);
                            CrawlState::FetchingDetail {
                                page,
                                stubs: listing.stubs.into(),
                                has_next_page: listing.has_next_page,
                            }
                        }
                    }
                    Err(e) => CrawlState::Aborted(AbortInfo {
                        platform,
                        page,
                        url,
                        reason: e.to_string(),
                    }),
                },
                CrawlState::FetchingDetail {
                    page,
                    mut stubs,
                    has_next_page,
                } => match stubs.pop_front() {
                    Some(mut stub) => {
                        stub.platform = stub.platform.or(platform);
                        self.scrape_item(stub, outcome).await;
                        CrawlState::FetchingDetail {
                            page,
                            stubs,
                            has_next_page,
                        }
                    }
                    None if has_next_page => match cursor.advance() {
                        Some(next) => CrawlState::Fetching(next),
                        None => {
                            log::info!("Page budget reached after page {}", page);
                            CrawlState::Done
                        }
                    },
                    None => CrawlState::Done,
                },
                CrawlState::Done => return None,
                CrawlState::Aborted(info) => return Some(info),
            };
        }
    }

    async fn scrape_item(&mut self, stub: ItemStub, outcome: &mut CrawlOutcome) {
        match self.fetch_game_detail(&stub).await {
            Ok(detail) => outcome.record(detail),
            Err(ScraperError::FetchError(e)) if e.is_transient() => {
                log::warn!("Giving up on {} for now: {}", stub, e);
                outcome.skipped += 1;
                outcome.failed_items.push(self.config.absolute_url(&stub.url));
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", stub, e);
                outcome.skipped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::fetcher::tests::ScriptedTransport;
    use std::fs;
    use std::path::Path;

    const BASE: &str = "http://test.local";

    fn fixture(name: &str) -> String {
        fs::read_to_string(format!("fixtures/{}", name)).expect("Failed to read fixture")
    }

    fn config(output: &Path) -> CrawlConfig {
        CrawlConfig {
            base_url: BASE.to_string(),
            output_path: output.to_path_buf(),
            fetch: FetchConfig::immediate(),
            ..CrawlConfig::default()
        }
    }

    fn listing_url(page: u32) -> String {
        CrawlConfig {
            base_url: BASE.to_string(),
            ..CrawlConfig::default()
        }
        .listing_url(None, page)
    }

    fn listing_html(slugs: &[&str], has_next_page: bool) -> String {
        let cards: String = slugs
            .iter()
            .enumerate()
            .map(|(i, slug)| {
                format!(
                    r#"<a class="c-finderProductCard_container" href="/game/{slug}/">
                         <div class="c-finderProductCard_title">{}. {slug}</div>
                       </a>"#,
                    i + 1
                )
            })
            .collect();
        let next = if has_next_page {
            r#"<a class="c-navigationPagination_item--next" href="?page=next">Next</a>"#
        } else {
            r#"<span class="c-navigationPagination_item--next c-navigationPagination_item--disabled">Next</span>"#
        };
        format!(r#"<div class="c-productListings">{cards}</div>{next}"#)
    }

    fn detail_html(title: &str, platform: &str, critic_score: u8) -> String {
        format!(
            r#"<div class="c-productHero_title"><h1>{title}</h1></div>
               <div data-testid="critic-score-info"><div class="c-siteReviewScore"><span>{critic_score}</span></div></div>
               <div class="c-gameDetails_Platforms"><ul><li>{platform}</li></ul></div>"#
        )
    }

    fn scored_detail_html(title: &str, critic_score: &str, user_score: &str) -> String {
        format!(
            r#"<div class="c-productHero_title"><h1>{title}</h1></div>
               <div data-testid="critic-score-info"><div class="c-siteReviewScore"><span>{critic_score}</span></div></div>
               <div data-testid="user-score-info"><div class="c-siteReviewScore"><span>{user_score}</span></div></div>
               <div class="c-gameDetails_Platforms"><ul><li>PC</li></ul></div>"#
        )
    }

    fn detail_url(slug: &str) -> String {
        format!("{}/game/{}/", BASE, slug)
    }

    fn two_page_site() -> ScriptedTransport {
        ScriptedTransport::default()
            .page(&listing_url(1), &fixture("listing_page_1.html"))
            .page(&listing_url(2), &fixture("listing_page_2.html"))
            .page(
                &detail_url("the-legend-of-zelda-breath-of-the-wild"),
                &fixture("game_zelda.html"),
            )
            .page(&detail_url("red-dead-redemption-2"), &fixture("game_rdr2.html"))
            .page(&detail_url("hades"), &fixture("game_no_user_score.html"))
    }

    #[tokio::test]
    async fn test_two_page_crawl_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let mut scraper = WebScraper::with_transport(config(&output), two_page_site()).unwrap();

        let report = scraper.run().await.expect("run succeeds");

        assert!(!report.aborted());
        assert_eq!(report.pages_crawled, 2);
        assert_eq!(report.records_scraped, 3);
        assert_eq!(report.records_written, 3);
        assert_eq!(report.skipped, 0);
        assert!(report.failed_items.is_empty());

        let dataset = Dataset::load(&output).unwrap();
        let titles: Vec<_> = dataset.records().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "The Legend of Zelda: Breath of the Wild",
                "Red Dead Redemption 2",
                "Hades"
            ]
        );
        let rdr2 = &dataset.records()[1];
        assert_eq!(rdr2.platform, Platform::Ps4);
        assert_eq!(rdr2.source_url, detail_url("red-dead-redemption-2"));
        assert_eq!(dataset.records()[2].user_score, None);
    }

    #[tokio::test]
    async fn test_transient_detail_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let hades = detail_url("hades");
        let transport = ScriptedTransport::default()
            .page(&listing_url(1), &fixture("listing_page_2.html"))
            .push(&hades, Err(FetchError::transient(&hades, "HTTP 503")))
            .push(&hades, Err(FetchError::transient(&hades, "HTTP 429")))
            .page(&hades, &fixture("game_no_user_score.html"));
        let mut cfg = config(&output);
        cfg.fetch.max_retries = 3;
        let mut scraper = WebScraper::with_transport(cfg, transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert_eq!(report.records_written, 1);
        assert_eq!(report.skipped, 0);
        assert!(report.failed_items.is_empty());
        assert_eq!(scraper.fetcher.transport().calls_to(&hades), 3);
    }

    #[tokio::test]
    async fn test_schema_mismatch_aborts_and_keeps_earlier_pages() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let transport = ScriptedTransport::default()
            .page(&listing_url(1), &listing_html(&["a", "b"], true))
            .page(&listing_url(2), &listing_html(&["c", "d"], true))
            .page(&listing_url(3), &fixture("listing_layout_changed.html"))
            .page(&detail_url("a"), &detail_html("Alpha", "PC", 80))
            .page(&detail_url("b"), &detail_html("Bravo", "PC", 70))
            .page(&detail_url("c"), &detail_html("Charlie", "Xbox One", 60))
            .page(&detail_url("d"), &detail_html("Delta", "Wii", 50));
        let mut scraper = WebScraper::with_transport(config(&output), transport).unwrap();

        let report = scraper.run().await.expect("abort is not a run error");

        let info = report.aborted.as_ref().expect("crawl should abort");
        assert_eq!(info.page, 3);
        assert_eq!(info.url, listing_url(3));
        assert_eq!(report.pages_crawled, 2);
        assert_eq!(report.records_written, 4);

        let dataset = Dataset::load(&output).unwrap();
        assert_eq!(dataset.len(), 4);
        assert!(dataset.records().iter().any(|r| r.title == "Delta"));
    }

    #[tokio::test]
    async fn test_detail_failures_skip_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let flaky = detail_url("flaky");
        let transport = ScriptedTransport::default()
            .page(&listing_url(1), &listing_html(&["gone", "flaky", "broken", "ok"], false))
            .push(
                &detail_url("gone"),
                Err(FetchError::permanent(&detail_url("gone"), "HTTP 404")),
            )
            .push(&flaky, Err(FetchError::transient(&flaky, "timed out")))
            .page(&detail_url("broken"), &fixture("game_no_title.html"))
            .page(&detail_url("ok"), &detail_html("Okay Game", "PC", 75));
        let mut cfg = config(&output);
        cfg.fetch.max_retries = 1;
        let mut scraper = WebScraper::with_transport(cfg, transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert!(!report.aborted());
        assert_eq!(report.records_written, 1);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.failed_items, vec![flaky.clone()]);
        assert_eq!(scraper.fetcher.transport().calls_to(&flaky), 2);
    }

    #[tokio::test]
    async fn test_listing_fetch_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let transport = ScriptedTransport::default().push(
            &listing_url(1),
            Err(FetchError::transient(&listing_url(1), "HTTP 503")),
        );
        let mut cfg = config(&output);
        cfg.fetch.max_retries = 2;
        let mut scraper = WebScraper::with_transport(cfg, transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert_eq!(report.aborted.as_ref().map(|a| a.page), Some(1));
        assert_eq!(report.records_written, 0);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_page_budget_and_start_page() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let transport = ScriptedTransport::default()
            .page(&listing_url(2), &listing_html(&["b"], true))
            .page(&listing_url(3), &listing_html(&["c"], true))
            .page(&detail_url("b"), &detail_html("Bravo", "PC", 70))
            .page(&detail_url("c"), &detail_html("Charlie", "PC", 60));
        let mut cfg = config(&output);
        cfg.start_page = 2;
        cfg.max_pages = Some(1);
        let mut scraper = WebScraper::with_transport(cfg, transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert!(!report.aborted());
        assert_eq!(report.pages_crawled, 1);
        assert_eq!(report.records_written, 1);
        assert_eq!(scraper.fetcher.transport().calls_to(&listing_url(3)), 0);
    }

    #[tokio::test]
    async fn test_duplicate_key_keeps_later_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let transport = ScriptedTransport::default()
            .page(&listing_url(1), &listing_html(&["x-old"], true))
            .page(&listing_url(2), &listing_html(&["x-new"], false))
            .page(&detail_url("x-old"), &detail_html("X", "PC", 70))
            .page(&detail_url("x-new"), &detail_html("X", "PC", 75));
        let mut scraper = WebScraper::with_transport(config(&output), transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert_eq!(report.records_written, 1);
        let dataset = Dataset::load(&output).unwrap();
        assert_eq!(dataset.records()[0].critic_score, Some(75));
        assert_eq!(dataset.records()[0].source_url, detail_url("x-new"));
    }

    #[tokio::test]
    async fn test_partial_later_fetch_keeps_complete_record() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let transport = ScriptedTransport::default()
            .page(&listing_url(1), &listing_html(&["x-old"], true))
            .page(&listing_url(2), &listing_html(&["x-new"], false))
            .page(&detail_url("x-old"), &scored_detail_html("X", "70", "8.0"))
            .page(&detail_url("x-new"), &scored_detail_html("X", "150", "42"));
        let mut scraper = WebScraper::with_transport(config(&output), transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert_eq!(report.records_written, 1);
        let dataset = Dataset::load(&output).unwrap();
        let x = &dataset.records()[0];
        assert_eq!(x.critic_score, Some(70));
        assert_eq!(x.user_score, Some(8.0));
        assert_eq!(x.source_url, detail_url("x-old"));
    }

    #[tokio::test]
    async fn test_partial_retry_keeps_stored_record() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let transport = ScriptedTransport::default()
            .page(&listing_url(1), &listing_html(&["x"], false))
            .page(&detail_url("x"), &scored_detail_html("X", "70", "8.0"));
        WebScraper::with_transport(config(&output), transport)
            .unwrap()
            .run()
            .await
            .unwrap();

        let transport = ScriptedTransport::default()
            .page(&detail_url("x"), &scored_detail_html("X", "150", "42"));
        let mut retry = WebScraper::with_transport(config(&output), transport).unwrap();
        let report = retry.retry_items(&[detail_url("x")]).await.unwrap();

        assert_eq!(report.updated, 0);
        let binding = Dataset::load(&output).unwrap();
        let x = &binding.records()[0];
        assert_eq!(x.critic_score, Some(70));
        assert_eq!(x.user_score, Some(8.0));
    }

    #[test]
    fn test_page_cursor_stops_at_last_page_number() {
        let mut cursor = PageCursor::new(u32::MAX - 1, None);
        assert_eq!(cursor.advance(), Some(u32::MAX - 1));
        assert_eq!(cursor.advance(), Some(u32::MAX));
        assert_eq!(cursor.advance(), None);
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn test_page_cursor_respects_budget() {
        let mut cursor = PageCursor::new(3, Some(2));
        assert_eq!(cursor.advance(), Some(3));
        assert_eq!(cursor.advance(), Some(4));
        assert_eq!(cursor.advance(), None);
    }

    #[tokio::test]
    async fn test_platform_filter_crawls_each_platform() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let mut cfg = config(&output);
        cfg.platforms = vec![Platform::Pc, Platform::Ps5];
        let pc_url = cfg.listing_url(Some(Platform::Pc), 1);
        let ps5_url = cfg.listing_url(Some(Platform::Ps5), 1);
        // The detail page lists another platform first; the crawl's filter decides.
        let transport = ScriptedTransport::default()
            .page(&pc_url, &listing_html(&["hades"], false))
            .page(&ps5_url, &listing_html(&["hades"], false))
            .page(&detail_url("hades"), &detail_html("Hades", "Nintendo Switch", 93));
        let mut scraper = WebScraper::with_transport(cfg, transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert_eq!(report.records_written, 2);
        let platforms: Vec<_> = Dataset::load(&output)
            .unwrap()
            .records()
            .iter()
            .map(|r| r.platform)
            .collect();
        assert_eq!(platforms, vec![Platform::Pc, Platform::Ps5]);
    }

    #[tokio::test]
    async fn test_empty_first_page_is_done() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let transport =
            ScriptedTransport::default().page(&listing_url(1), &fixture("listing_empty.html"));
        let mut scraper = WebScraper::with_transport(config(&output), transport).unwrap();

        let report = scraper.run().await.unwrap();

        assert!(!report.aborted());
        assert_eq!(report.pages_crawled, 1);
        assert_eq!(report.records_written, 0);
    }

    #[tokio::test]
    async fn test_retry_items_merges_into_existing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("games.csv");
        let mut scraper =
            WebScraper::with_transport(config(&output), two_page_site()).unwrap();
        scraper.run().await.unwrap();

        let transport = ScriptedTransport::default()
            .page(&detail_url("celeste"), &detail_html("Celeste", "PC", 94))
            .push(
                &detail_url("still-down"),
                Err(FetchError::transient(&detail_url("still-down"), "HTTP 502")),
            );
        let mut cfg = config(&output);
        cfg.fetch.max_retries = 0;
        let mut retry = WebScraper::with_transport(cfg, transport).unwrap();

        let report = retry
            .retry_items(&[detail_url("celeste"), detail_url("still-down")])
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.records_written, 4);
        assert_eq!(report.failed_items, vec![detail_url("still-down")]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = CrawlConfig {
            start_page: 0,
            ..CrawlConfig::default()
        };
        assert!(matches!(
            WebScraper::with_transport(config, ScriptedTransport::default()),
            Err(ScraperError::ConfigError(_))
        ));
    }
}
