//! Blog Archive main entry point
//!
//! This is the command-line interface for feed discovery and guided
//! historical crawls. Results are printed as JSON on stdout.

use anyhow::{bail, Context};
use blog_archive::config::{load_config, Config};
use blog_archive::fetch::{
    CachingHttpClient, CachingPuppeteerClient, CrawlContext, CrawlSettings, FetchCache, HttpClient,
    PuppeteerClient, ReqwestHttpClient, TracingProgress,
};
use blog_archive::{discover_feeds_at_url, guided_crawl, DiscoverFeedsResult};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Blog Archive: recovers a blog's complete post history from its feed
#[derive(Parser, Debug)]
#[command(name = "blog-archive")]
#[command(version)]
#[command(about = "Recovers a blog's complete post history", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Record every fetch into this JSON file
    #[arg(long, value_name = "FILE")]
    cache: Option<PathBuf>,

    /// Serve fetches only from --cache, never touching the network
    #[arg(long, requires = "cache")]
    replay: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the feeds exposed at a URL
    Discover {
        /// A blog URL, feed URL or bare host
        url: String,
    },
    /// Discover the feed at a URL and crawl the blog's history
    Crawl {
        /// A blog URL, feed URL or bare host
        url: String,
    },
}

impl Command {
    fn url(&self) -> &str {
        match self {
            Command::Discover { url } | Command::Crawl { url } => url,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    let cache = match &cli.cache {
        Some(path) => Some(open_cache(path, cli.replay)?),
        None => None,
    };

    let mut ctx = build_context(&config, cache.as_ref(), cli.replay, cli.command.url())?;
    let timeout = Duration::from_secs(config.crawl.timeout_secs);
    let attempts = config.crawl.discovery_attempts;

    let outcome = tokio::time::timeout(timeout, run_command(&cli.command, attempts, &mut ctx))
        .await
        .with_context(|| format!("Timed out after {}s", config.crawl.timeout_secs));

    if let (Some(cache), Some(path), false) = (&cache, &cli.cache, cli.replay) {
        cache
            .save(path)
            .with_context(|| format!("Failed to save cache {}", path.display()))?;
        tracing::info!(
            "Saved {} fetches and {} renders to {}",
            cache.fetch_count(),
            cache.render_count(),
            path.display()
        );
    }

    outcome?
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("blog_archive=info,warn"),
            1 => EnvFilter::new("blog_archive=debug,info"),
            2 => EnvFilter::new("blog_archive=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so stdout stays parseable JSON
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_cache(path: &Path, replay: bool) -> anyhow::Result<Arc<FetchCache>> {
    let cache = if replay || path.exists() {
        FetchCache::load(path).with_context(|| format!("Failed to load cache {}", path.display()))?
    } else {
        FetchCache::new()
    };
    Ok(Arc::new(cache))
}

/// Builds the crawl context, wrapping the clients in the cache when one is given
fn build_context(
    config: &Config,
    cache: Option<&Arc<FetchCache>>,
    replay: bool,
    scope: &str,
) -> anyhow::Result<CrawlContext> {
    let settings = CrawlSettings::from_config(config);

    let http_client: Arc<dyn HttpClient> = match (cache, replay) {
        (Some(cache), true) => Arc::new(CachingHttpClient::replaying(cache.clone(), scope)),
        (Some(cache), false) => Arc::new(CachingHttpClient::recording(
            Arc::new(ReqwestHttpClient::new(&config.fetch, &config.user_agent)?),
            cache.clone(),
            scope,
        )),
        (None, _) => Arc::new(ReqwestHttpClient::new(&config.fetch, &config.user_agent)?),
    };

    let mut ctx = CrawlContext::new(http_client, settings).with_progress(Box::new(TracingProgress));
    let puppeteer_client: Option<Arc<dyn PuppeteerClient>> = match (cache, replay) {
        (Some(cache), true) if cache.render_count() > 0 => {
            Some(Arc::new(CachingPuppeteerClient::replaying(cache.clone(), scope))
                as Arc<dyn PuppeteerClient>)
        }
        (Some(_), true) => None,
        (cache, _) => browser_client(config).map(|browser| match cache {
            Some(cache) => Arc::new(CachingPuppeteerClient::recording(browser, cache.clone(), scope))
                as Arc<dyn PuppeteerClient>,
            None => browser,
        }),
    };
    if let Some(client) = puppeteer_client {
        ctx = ctx.with_puppeteer(client);
    }
    Ok(ctx)
}

#[cfg(feature = "browser")]
fn browser_client(config: &Config) -> Option<Arc<dyn PuppeteerClient>> {
    use blog_archive::fetch::{BrowserSlots, ChromiumPuppeteerClient};

    let slots = BrowserSlots::new(config.browser.max_browser_count);
    Some(Arc::new(ChromiumPuppeteerClient::new(
        slots,
        config.user_agent.header_value(),
    )))
}

#[cfg(not(feature = "browser"))]
fn browser_client(_config: &Config) -> Option<Arc<dyn PuppeteerClient>> {
    None
}

async fn run_command(command: &Command, attempts: u32, ctx: &mut CrawlContext) -> anyhow::Result<()> {
    match command {
        Command::Discover { url } => {
            let result = discover_feeds_at_url(url, attempts, ctx).await;
            print_json(&result)
        }
        Command::Crawl { url } => handle_crawl(url, attempts, ctx).await,
    }
}

/// Handles the crawl command: discovery followed by a guided crawl
async fn handle_crawl(url: &str, attempts: u32, ctx: &mut CrawlContext) -> anyhow::Result<()> {
    let (feed, start_page) = match discover_feeds_at_url(url, attempts, ctx).await {
        DiscoverFeedsResult::SingleFeed { feed, start_page } => (feed, start_page),
        other => {
            print_json(&other)?;
            bail!("Discovery at {} did not produce a single feed", url);
        }
    };

    tracing::info!(
        "Crawling history of {} guided by {} entries",
        feed.final_url.url,
        feed.parsed.entry_links.len()
    );
    let result = guided_crawl(start_page.as_ref(), &feed, ctx).await;

    print_json(&serde_json::json!({
        "result": result,
        "counters": ctx.counters,
    }))?;

    if let Some(error) = result.hardcoded_error() {
        tracing::warn!("{}", error);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
