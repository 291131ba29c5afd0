use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use metacrawl::config::{self, ConfigError, CrawlConfig, DEFAULT_OUTPUT_PATH, FetchConfig};
use metacrawl::dataset::{self, Dataset};
use metacrawl::scraper::{RunReport, WebScraper};
use metacrawl::types::{ItemStub, Platform};
use metacrawl::utils::DatasetStats;

#[derive(Parser)]
#[command(name = "metacrawl")]
#[command(about = "A metacritic.com game data scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
struct FetchArgs {
    #[arg(
        long = "delay",
        value_name = "SECONDS",
        default_value_t = 1.0,
        help = "Politeness delay before each request"
    )]
    request_delay_seconds: f64,

    #[arg(
        long = "jitter",
        value_name = "SECONDS",
        default_value_t = 0.5,
        help = "Random extra delay added to each request, up to this many seconds"
    )]
    jitter_seconds: f64,

    #[arg(
        long,
        default_value_t = 3,
        help = "Retries after the first attempt for rate limits, server errors and timeouts"
    )]
    max_retries: u32,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        default_value_t = 30,
        help = "Per-request timeout"
    )]
    timeout_seconds: u64,

    #[arg(long, help = "Override the User-Agent header")]
    user_agent: Option<String>,

    #[arg(long, default_value = config::BASE_URL, help = "Site root that listing and detail links resolve against")]
    base_url: String,
}

impl FetchArgs {
    fn to_config(&self) -> Result<FetchConfig, ConfigError> {
        let defaults = FetchConfig::default();
        Ok(FetchConfig {
            request_delay: config::seconds("delay", self.request_delay_seconds)?,
            jitter: config::seconds("jitter", self.jitter_seconds)?,
            max_retries: self.max_retries,
            timeout: std::time::Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent.clone()),
            ..defaults
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl listing pages and their detail pages, merging the results into the dataset file
    Scrape {
        #[arg(
            long,
            default_value_t = 1,
            help = "First listing page to fetch",
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        start_page: u32,

        #[arg(
            long,
            help = "Maximum number of listing pages per platform (unbounded when omitted)",
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        max_pages: Option<u32>,

        #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT_PATH, help = "Dataset CSV file")]
        output_path: PathBuf,

        #[arg(
            long = "platform",
            value_parser = parse_platform,
            help = "Crawl only this platform; repeat for several (all platforms when omitted)"
        )]
        platforms: Vec<Platform>,

        #[arg(long = "year-min", default_value_t = 1958, help = "Earliest release year")]
        release_year_min: u16,

        #[arg(long = "year-max", default_value_t = 2024, help = "Latest release year")]
        release_year_max: u16,

        #[arg(
            long = "failed-output",
            help = "Where to list items that still failed after retries [default: <output>.failed]"
        )]
        failed_output: Option<PathBuf>,

        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Fetch and parse a single game detail page
    Detail {
        #[arg(help = "URL or site path of the game detail page")]
        url: String,

        #[arg(long, value_parser = parse_platform, help = "Platform of this entry (defaults to the first listed on the page)")]
        platform: Option<Platform>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,

        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Re-fetch items listed in a failed-items file and merge them into the dataset
    Retry {
        #[arg(short = 'i', long = "input", help = "File with one detail URL per line")]
        input: PathBuf,

        #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT_PATH, help = "Dataset CSV file")]
        output_path: PathBuf,

        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Summarise an existing dataset file
    Stats {
        #[arg(short = 'i', long = "input", default_value = DEFAULT_OUTPUT_PATH, help = "Dataset CSV file")]
        input: PathBuf,
    },
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    Platform::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn fail<T, E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> T + '_ {
    move |e| {
        log::error!("{}: {}", context, e);
        process::exit(1)
    }
}

fn build_scraper(config: CrawlConfig) -> WebScraper {
    WebScraper::new(config).unwrap_or_else(fail("Error creating scraper"))
}

fn write_failed_items(path: &Path, report: &RunReport) {
    if let Err(e) = dataset::write_url_list(path, &report.failed_items) {
        log::error!("Error writing failed items list: {}", e);
        process::exit(1);
    }
    if !report.failed_items.is_empty() {
        log::warn!(
            "{} item(s) need a retry; run `metacrawl retry --input {}`",
            report.failed_items.len(),
            path.display()
        );
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Scrape {
            start_page,
            max_pages,
            output_path,
            platforms,
            release_year_min,
            release_year_max,
            failed_output,
            fetch,
        } => {
            let fetch_config = fetch.to_config().unwrap_or_else(fail("Invalid args"));
            let config = CrawlConfig {
                start_page,
                max_pages,
                output_path,
                platforms,
                release_year_min,
                release_year_max,
                base_url: fetch.base_url.clone(),
                fetch: fetch_config,
            };
            let failed_path = failed_output.unwrap_or_else(|| config.failed_items_path());

            let mut scraper = build_scraper(config);
            let report = scraper
                .run()
                .await
                .unwrap_or_else(fail("Error running scraper"));

            print!("{}", report);
            write_failed_items(&failed_path, &report);

            if report.aborted() {
                process::exit(2);
            }
        }

        Commands::Detail {
            url,
            platform,
            format,
            fetch,
        } => {
            let config = CrawlConfig {
                base_url: fetch.base_url.clone(),
                fetch: fetch.to_config().unwrap_or_else(fail("Invalid args")),
                ..CrawlConfig::default()
            };
            let mut scraper = build_scraper(config);
            let stub = ItemStub {
                platform,
                ..ItemStub::from_url(url)
            };

            let detail = scraper
                .fetch_game_detail(&stub)
                .await
                .unwrap_or_else(fail("Error fetching game detail"));
            if detail.is_partial() {
                log::warn!(
                    "{} field(s) could not be read and were left empty",
                    detail.anomalies.len()
                );
            }
            let record = detail.record;

            match format {
                OutputFormat::Json => serialize_json(&record),
                OutputFormat::Text => println!("{}", record),
            }
        }

        Commands::Retry {
            input,
            output_path,
            fetch,
        } => {
            let urls = dataset::read_url_list(&input)
                .unwrap_or_else(fail("Error reading failed items list"));
            if urls.is_empty() {
                println!("No items to retry.");
                return;
            }

            let config = CrawlConfig {
                output_path,
                base_url: fetch.base_url.clone(),
                fetch: fetch.to_config().unwrap_or_else(fail("Invalid args")),
                ..CrawlConfig::default()
            };
            let mut scraper = build_scraper(config);
            let report = scraper
                .retry_items(&urls)
                .await
                .unwrap_or_else(fail("Error retrying items"));

            print!("{}", report);
            write_failed_items(&input, &report);
        }

        Commands::Stats { input } => {
            let dataset =
                Dataset::load(&input).unwrap_or_else(fail("Error loading dataset"));
            if dataset.is_empty() {
                println!("No entries to summarise.");
            } else {
                print!("{}", DatasetStats::from_records(dataset.records()));
            }
        }
    }
}
