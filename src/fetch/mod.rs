//! Fetch abstraction for guided crawls
//!
//! This module contains:
//! - The [`HttpClient`] and [`PuppeteerClient`] capabilities and their
//!   production implementations
//! - Recording/replay wrappers with identical signatures
//! - [`CrawlContext`], the per-crawl dedup record and counters
//! - [`request_page`], which fetches each canonical URI at most once

#[cfg(feature = "browser")]
mod browser;
mod cache;
mod context;
mod http;
mod puppeteer;
mod request;

#[cfg(feature = "browser")]
pub use browser::ChromiumPuppeteerClient;
pub use cache::{
    CacheMode, CachedFetch, CachedRender, CachingHttpClient, CachingPuppeteerClient, FetchCache,
    FetchCacheSnapshot,
};
pub use context::{
    CrawlContext, CrawlCounters, CrawlProgress, CrawlSettings, NoProgress, ProgressReporter,
    TracingProgress,
};
pub use http::{build_http_client, scheduled_delay, HttpClient, HttpResponse, ReqwestHttpClient};
pub use puppeteer::{
    contains_all_titles, default_load_more_button, BrowserSlots, FindLoadMoreButton,
    PuppeteerClient,
};
pub use request::{render_page, request_page, FetchedPage};
