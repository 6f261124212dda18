//! Shared helpers for integration tests

use async_trait::async_trait;
use blog_archive::config::{FetchConfig, UserAgentConfig};
use blog_archive::fetch::{CrawlContext, CrawlSettings, HttpClient, HttpResponse, ReqwestHttpClient};
use blog_archive::{Config, FetchError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates crawl settings with small budgets for testing
pub fn create_test_settings() -> CrawlSettings {
    CrawlSettings {
        max_pages: 20,
        max_title_fetches: 5,
        ..CrawlSettings::from_config(&Config::default())
    }
}

/// Creates a reqwest-backed client with no throttling and short retry delays
pub fn create_test_client() -> ReqwestHttpClient {
    let fetch = FetchConfig {
        throttle_interval_ms: 0,
        retry_delays_ms: vec![10, 20, 40],
        ..FetchConfig::default()
    };
    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
    };
    ReqwestHttpClient::new(&fetch, &user_agent).expect("client builds")
}

pub fn create_test_context() -> CrawlContext {
    CrawlContext::new(Arc::new(create_test_client()), create_test_settings())
}

/// Wraps a client and counts requests per exact URL
pub struct CountingClient {
    inner: Arc<dyn HttpClient>,
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingClient {
    pub fn new(inner: Arc<dyn HttpClient>) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl HttpClient for CountingClient {
    async fn request(&self, uri: &Url, should_throttle: bool) -> Result<HttpResponse, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(uri.as_str().to_string())
            .or_insert(0) += 1;
        self.inner.request(uri, should_throttle).await
    }

    fn retry_delay(&self, attempts_made: u32) -> Duration {
        self.inner.retry_delay(attempts_made)
    }
}

/// Mounts an HTML page at `page_path`
pub async fn mount_html(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Mounts an RSS feed at `feed_path`
pub async fn mount_feed(server: &MockServer, feed_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(feed_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "application/rss+xml"),
        )
        .mount(server)
        .await;
}

/// Builds an RSS 2.0 feed whose channel links to `home`
///
/// `items` are `(title, url)` pairs, newest first.
pub fn rss_feed(home: &str, items: &[(&str, String)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, url)| {
            format!(
                "<item><title>{}</title><link>{}</link><guid>{}</guid></item>",
                title, url, url
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>Test Blog</title>
<link>{}</link>
<description>A blog</description>
{}
</channel></rss>"#,
        home, items
    )
}

/// An HTML page whose head advertises `/feed.xml`
pub fn page_with_feed(body: &str) -> String {
    format!(
        r#"<html><head><title>Test Blog</title>
<link rel="alternate" type="application/rss+xml" title="Test Blog" href="/feed.xml">
</head><body>{}</body></html>"#,
        body
    )
}
