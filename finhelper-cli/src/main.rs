//! FinHelper CLI — scrape, sentiment and query commands.
//!
//! Commands:
//! - `scrape aggs` — scrape daily aggregates for the tickers in an instructions file
//! - `scrape news` — scrape news articles for the tickers in an instructions file
//! - `sentiment` — list stored articles that still lack sentiment insights
//! - `query aggs` / `query news` — print stored documents as JSON lines

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use finhelper_core::store::{
    aggregates_by_ticker_range, articles_by_ticker_range, open_store, ResultWindow, StoreGateway,
    TimeRange,
};
use finhelper_core::upstream::PolygonClient;
use finhelper_scraper::{
    pending_articles, run_batch, Aggregates, AppConfig, Collection, News, ScrapeInstructions,
    StdoutProgress, WindowScheduler,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "finhelper",
    about = "FinHelper — market data and news scraper"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store path. Overrides the config file and FINHELPER_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape upstream data into the store.
    Scrape {
        #[command(subcommand)]
        target: ScrapeTarget,
    },
    /// List articles waiting for sentiment insights.
    Sentiment {
        /// Page to show (1-based).
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Articles per page (1..=500).
        #[arg(long, default_value_t = 50)]
        page_size: u32,
    },
    /// Read stored documents.
    Query {
        #[command(subcommand)]
        target: QueryTarget,
    },
}

#[derive(Subcommand)]
enum ScrapeTarget {
    /// Daily price aggregates.
    Aggs {
        #[arg(long, default_value = "./scraper/aggs_instructions.json")]
        instructions: PathBuf,
    },
    /// News articles.
    News {
        #[arg(long, default_value = "./scraper/article_instructions.json")]
        instructions: PathBuf,
    },
}

#[derive(Subcommand)]
enum QueryTarget {
    /// Aggregates for one ticker, oldest first.
    Aggs {
        ticker: String,

        /// First day (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: Option<String>,

        /// Last day (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<String>,

        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Enables paging when non-zero.
        #[arg(long, default_value_t = 0)]
        page_size: u32,

        /// Cap on results when not paging. Zero means no cap.
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
    /// Articles for one ticker, newest first.
    News {
        ticker: String,

        /// First day (YYYY-MM-DD). Defaults to the epoch.
        #[arg(long)]
        start: Option<String>,

        /// Last day (YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Zero means the default of 100.
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    match cli.command {
        Commands::Scrape { target } => match target {
            ScrapeTarget::Aggs { instructions } => run_scrape::<Aggregates>(&config, &instructions),
            ScrapeTarget::News { instructions } => run_scrape::<News>(&config, &instructions),
        },
        Commands::Sentiment { page, page_size } => run_sentiment(&config, page, page_size),
        Commands::Query { target } => match target {
            QueryTarget::Aggs {
                ticker,
                start,
                end,
                page,
                page_size,
                limit,
            } => {
                let window = ResultWindow::from_params(limit, page, page_size);
                run_query_aggs(&config, &ticker, start, end, window)
            }
            QueryTarget::News {
                ticker,
                start,
                end,
                limit,
            } => run_query_news(&config, &ticker, start, end, limit),
        },
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,finhelper=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_scrape<C: Collection>(config: &AppConfig, instructions_path: &Path) -> Result<()> {
    config.require_api_keys()?;
    let instructions = ScrapeInstructions::from_file(instructions_path)
        .with_context(|| format!("invalid instructions in {}", instructions_path.display()))?;

    let conn = open_store(&config.store.path, config.busy_timeout())
        .with_context(|| format!("failed to open store at {}", config.store.path.display()))?;
    let mut client =
        PolygonClient::new(config.upstream.api_keys.clone(), config.polygon_settings())?;
    tracing::info!(
        collection = C::NAME,
        tickers = instructions.tickers.len(),
        start = %instructions.start.date_naive(),
        end = %instructions.end.date_naive(),
        "starting scrape"
    );

    let sink = StoreGateway::new(&conn);
    let progress = StdoutProgress;
    let mut scheduler =
        WindowScheduler::<C>::new(&mut client, &sink, &progress, instructions.options);
    run_batch(
        &mut scheduler,
        &instructions.tickers,
        instructions.start,
        instructions.end,
        &progress,
    )?;
    Ok(())
}

fn run_sentiment(config: &AppConfig, page: u32, page_size: u32) -> Result<()> {
    let conn = open_store(&config.store.path, config.busy_timeout())?;
    let pending = pending_articles(&conn, page, page_size)?;

    println!(
        "Articles without insights: {} (page {}/{}, {} per page)",
        pending.total,
        pending.page,
        pending.page_count().max(1),
        pending.page_size
    );
    for article in &pending.articles {
        println!(
            "  {} {} [{}] {}",
            article.published_at.format("%Y-%m-%d %H:%M"),
            article.id,
            article.tickers.join(","),
            article.title
        );
    }
    Ok(())
}

fn run_query_aggs(
    config: &AppConfig,
    ticker: &str,
    start: Option<String>,
    end: Option<String>,
    window: ResultWindow,
) -> Result<()> {
    let range = TimeRange::new(
        start.as_deref().map(day_start).transpose()?,
        end.as_deref().map(day_end_inclusive).transpose()?,
    );
    let conn = open_store(&config.store.path, config.busy_timeout())?;
    for agg in aggregates_by_ticker_range(&conn, ticker, range, window)? {
        println!("{}", serde_json::to_string(&agg)?);
    }
    Ok(())
}

fn run_query_news(
    config: &AppConfig,
    ticker: &str,
    start: Option<String>,
    end: Option<String>,
    limit: u32,
) -> Result<()> {
    let range = TimeRange::new(
        start.as_deref().map(day_start).transpose()?,
        end.as_deref()
            .map(|d| day_start(d).map(|t| t + TimeDelta::days(1)))
            .transpose()?,
    );
    if let (Some(s), Some(e)) = (range.start, range.end) {
        if s >= e {
            bail!("--start must be before --end");
        }
    }
    let conn = open_store(&config.store.path, config.busy_timeout())?;
    let window = ResultWindow::from_params(limit, 0, 0);
    for article in articles_by_ticker_range(&conn, ticker, range, window)? {
        println!("{}", serde_json::to_string(&article)?);
    }
    Ok(())
}

fn day_start(date: &str) -> Result<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("invalid date {date:?}, expected YYYY-MM-DD"))?;
    Ok(day.and_time(NaiveTime::MIN).and_utc())
}

fn day_end_inclusive(date: &str) -> Result<DateTime<Utc>> {
    Ok(day_start(date)? + TimeDelta::days(1) - TimeDelta::milliseconds(1))
}
