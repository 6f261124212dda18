//! Per-crawl mutable state
//!
//! A `CrawlContext` is owned by exactly one crawl invocation. It carries the
//! fetch clients, the set of canonical URIs already fetched, the pages they
//! produced, running counters and a progress reporter.

use crate::config::{Config, ManualHostEntry};
use crate::fetch::{FetchedPage, HttpClient, PuppeteerClient};
use crate::url::{CanonicalEqualityConfig, CanonicalUriMap, CanonicalUriSet};
use serde::Serialize;
use std::sync::Arc;

/// Running request counters for one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlCounters {
    /// HTTP requests issued, including retries and redirect hops
    pub requests_made: u32,
    /// Browser renders issued
    pub puppeteer_requests_made: u32,
    /// Fetches answered from the crawl's own record instead of the network
    pub duplicate_fetches: u32,
    /// Post pages fetched only to learn their title
    pub title_requests_made: u32,
}

/// A progress update emitted during a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlProgress {
    pub stage: String,
    pub pages_fetched: u32,
    pub links_found: usize,
}

/// Receives crawl progress updates
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &CrawlProgress);
}

/// Discards progress updates
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _progress: &CrawlProgress) {}
}

/// Logs progress updates at info level
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, progress: &CrawlProgress) {
        tracing::info!(
            "Progress [{}]: {} pages fetched, {} links found",
            progress.stage,
            progress.pages_fetched,
            progress.links_found
        );
    }
}

/// Crawl limits taken from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Page budget for one guided crawl
    pub max_pages: u32,
    /// Post pages that may be fetched only to learn their titles
    pub max_title_fetches: u32,
    /// Redirect hops followed per fetch
    pub max_redirects: u32,
    /// Attempts per fetch when failures are transient
    pub transient_retry_attempts: u32,
    /// Configured hosts that abort the crawl, on top of the built-in table
    pub manual_hosts: Vec<ManualHostEntry>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.crawl.max_pages,
            max_title_fetches: config.crawl.max_title_fetches,
            max_redirects: config.fetch.max_redirects,
            transient_retry_attempts: config.fetch.transient_retry_attempts,
            manual_hosts: config.manual.clone(),
        }
    }
}

/// Mutable state of a single crawl
pub struct CrawlContext {
    pub http_client: Arc<dyn HttpClient>,
    pub puppeteer_client: Option<Arc<dyn PuppeteerClient>>,
    /// Every canonical URI requested so far, including redirect hops
    pub fetched_curis: CanonicalUriSet,
    pub counters: CrawlCounters,
    pub settings: CrawlSettings,
    pub(crate) pages: CanonicalUriMap<Arc<FetchedPage>>,
    progress: Box<dyn ProgressReporter>,
}

impl CrawlContext {
    pub fn new(http_client: Arc<dyn HttpClient>, settings: CrawlSettings) -> Self {
        Self {
            http_client,
            puppeteer_client: None,
            fetched_curis: CanonicalUriSet::new(CanonicalEqualityConfig::default()),
            counters: CrawlCounters::default(),
            settings,
            pages: CanonicalUriMap::new(CanonicalEqualityConfig::default()),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_puppeteer(mut self, client: Arc<dyn PuppeteerClient>) -> Self {
        self.puppeteer_client = Some(client);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Switches dedup to a blog's equality config
    ///
    /// Already recorded URIs are re-keyed, so aliases fetched before the
    /// config was known now count as the same page.
    pub fn update_equality_config(&mut self, config: &CanonicalEqualityConfig) {
        self.fetched_curis.update_equality_config(config.clone());
        self.pages.update_equality_config(config.clone());
    }

    pub fn equality_config(&self) -> &CanonicalEqualityConfig {
        self.fetched_curis.config()
    }

    pub fn report_progress(&self, stage: &str, links_found: usize) {
        self.progress.report(&CrawlProgress {
            stage: stage.to_string(),
            pages_fetched: self.counters.requests_made,
            links_found,
        });
    }
}
