//! Blog Archive: historical post discovery for blog feeds
//!
//! This crate finds a blog's feed from an arbitrary URL, walks the blog's
//! archive or pagination structure to recover its complete, ordered post
//! history, and diffs freshly fetched feeds against a stored archive to
//! detect newly published posts without crawling again.

pub mod config;
pub mod crawler;
pub mod feed;
pub mod fetch;
pub mod title;
pub mod url;

use thiserror::Error;

/// Main error type for Blog Archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed::FeedParseError),

    #[error("Feed diff error: {0}")]
    FeedDiff(#[from] feed::FeedDiffError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed canonical URI: {0}")]
    Malformed(String),
}

/// Fetch-specific errors
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transport error for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        transient: bool,
    },

    #[error("HTTP {code} for {url}")]
    Status { url: String, code: u16 },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Redirect loop detected at {url}")]
    RedirectLoop { url: String },

    #[error("Redirect from {url} has unusable location {location:?}")]
    BadRedirect {
        url: String,
        location: Option<String>,
    },

    #[error("Previously failed fetch for {url}")]
    PreviouslyFailed { url: String },

    #[error("No recorded response for {url}")]
    NotRecorded { url: String },

    #[error("Browser error for {url}: {message}")]
    Browser { url: String, message: String },

    #[error("No browser client configured")]
    NoBrowser,

    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

impl FetchError {
    /// Returns true if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { transient, .. } => *transient,
            Self::Status { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

/// Result type alias for Blog Archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{guided_crawl, GuidedCrawlResult, HistoricalCrawlResult};
pub use feed::{discover_feeds_at_url, extract_new_posts_from_feed, DiscoverFeedsResult};
pub use fetch::CrawlContext;
pub use url::{canonical_uri_equal, to_canonical_link, CanonicalEqualityConfig, CanonicalUri, Link};
