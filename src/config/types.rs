use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Blog Archive
///
/// Every section is optional in the file; missing sections and keys take
/// the defaults below, and `Config::default()` passes validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    /// Extra hosts that need manual handling, on top of the built-in table
    #[serde(default)]
    pub manual: Vec<ManualHostEntry>,
}

/// HTTP fetching behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total timeout for a single request (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Minimum time between throttled requests (milliseconds)
    #[serde(rename = "throttle-interval-ms")]
    pub throttle_interval_ms: u64,

    /// Delay after each failed attempt; the last entry repeats (milliseconds)
    #[serde(rename = "retry-delays-ms")]
    pub retry_delays_ms: Vec<u64>,

    /// Redirect hops followed per fetch
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,

    /// Attempts per crawl fetch when failures are transient
    #[serde(rename = "transient-retry-attempts")]
    pub transient_retry_attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            throttle_interval_ms: 1000,
            retry_delays_ms: vec![1000, 5000, 15000],
            max_redirects: 10,
            transient_retry_attempts: 3,
        }
    }
}

impl FetchConfig {
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .map(|&ms| Duration::from_millis(ms))
            .collect()
    }
}

/// Guided crawl limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Page budget for one guided crawl
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Post pages fetched only to learn their titles
    #[serde(rename = "max-title-fetches")]
    pub max_title_fetches: u32,

    /// Attempts when discovery cannot reach the input URL
    #[serde(rename = "discovery-attempts")]
    pub discovery_attempts: u32,

    /// Wall clock bound for one CLI command (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 200,
            max_title_fetches: 50,
            discovery_attempts: 3,
            timeout_secs: 600,
        }
    }
}

/// Headless browser limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Process-wide cap on live browser instances
    #[serde(rename = "max-browser-count")]
    pub max_browser_count: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            max_browser_count: 2,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "BlogArchive".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/blog-archive".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// A host that needs manual handling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManualHostEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    /// Why the host cannot be crawled automatically
    pub reason: String,
}
